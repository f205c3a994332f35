//! Query handles and their response slots.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error_handling::QueryError;
use crate::geoip::GeoLocation;

type Response = Result<GeoLocation, QueryError>;

/// A submitted lookup, returned by [`GeoService::submit`](super::GeoService::submit).
///
/// Giving up on the wait marks the query invalid so the service skips it if
/// it has not started yet. It is never removed from the queue, and a lookup
/// already running still completes; its result is discarded.
#[derive(Debug)]
pub struct Query {
    ip: IpAddr,
    response: oneshot::Receiver<Response>,
    valid: Arc<AtomicBool>,
}

/// The service side of a [`Query`].
#[derive(Debug)]
pub(crate) struct PendingQuery {
    pub(crate) ip: IpAddr,
    respond_to: oneshot::Sender<Response>,
    valid: Arc<AtomicBool>,
}

impl Query {
    pub(crate) fn new(ip: IpAddr) -> (Self, PendingQuery) {
        let (respond_to, response) = oneshot::channel();
        let valid = Arc::new(AtomicBool::new(true));
        let query = Self {
            ip,
            response,
            valid: Arc::clone(&valid),
        };
        let pending = PendingQuery {
            ip,
            respond_to,
            valid,
        };
        (query, pending)
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Marks the query invalid without waiting for it.
    pub fn cancel(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    /// Waits for the response until `deadline`.
    ///
    /// A deadline already in the past returns [`QueryError::DeadlineElapsed`]
    /// without looking at the response slot.
    pub async fn wait(self, deadline: Instant) -> Result<GeoLocation, QueryError> {
        if deadline <= Instant::now() {
            self.cancel();
            return Err(QueryError::DeadlineElapsed);
        }

        match tokio::time::timeout_at(deadline, self.response).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => Err(QueryError::ServiceStopped),
            Err(_) => {
                self.valid.store(false, Ordering::SeqCst);
                log::debug!("Geo request for {} timed out", self.ip);
                Err(QueryError::DeadlineElapsed)
            }
        }
    }

    /// Like [`wait`](Self::wait), but also gives up when `cancel` fires.
    pub async fn wait_or_cancel(
        self,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<GeoLocation, QueryError> {
        if cancel.is_cancelled() {
            self.cancel();
            return Err(QueryError::Cancelled);
        }

        let valid = Arc::clone(&self.valid);
        tokio::select! {
            result = self.wait(deadline) => result,
            _ = cancel.cancelled() => {
                valid.store(false, Ordering::SeqCst);
                Err(QueryError::Cancelled)
            }
        }
    }
}

impl PendingQuery {
    /// False once the caller cancelled or stopped waiting.
    pub(crate) fn is_live(&self) -> bool {
        self.valid.load(Ordering::SeqCst) && !self.respond_to.is_closed()
    }

    /// Fills the response slot; a caller that went away is ignored.
    pub(crate) fn respond(self, response: Response) {
        let _ = self.respond_to.send(response);
    }
}
