//! Reload signaling between the geo pipeline and the owner task.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use super::state::Shared;
use crate::config::RELOAD_QUEUE_CAPACITY;
use crate::error_handling::EventKind;

/// Non-blocking sender for reload requests.
///
/// At most [`RELOAD_QUEUE_CAPACITY`] triggers are pending at once; further
/// ones are dropped. Every reload re-reads the full version record, so a
/// dropped trigger loses nothing.
#[derive(Clone)]
pub(crate) struct ReloadTrigger {
    sender: mpsc::Sender<()>,
    shared: Arc<Shared>,
}

impl ReloadTrigger {
    pub(crate) fn channel(shared: Arc<Shared>) -> (Self, mpsc::Receiver<()>) {
        let (sender, receiver) = mpsc::channel(RELOAD_QUEUE_CAPACITY);
        (Self { sender, shared }, receiver)
    }

    /// Requests a reload; returns false when the trigger was dropped.
    pub(crate) fn fire(&self) -> bool {
        match self.sender.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                log::warn!("Unable to reload geo, reload channel is full");
                self.shared.stats.increment(EventKind::ReloadDropped);
                false
            }
            Err(TrySendError::Closed(())) => {
                log::debug!("Reload requested after the lookup service stopped");
                false
            }
        }
    }
}
