//! The geo lookup service.
//!
//! [`GeoService`] owns a running service: the lookup owner task plus the
//! MaxMind and Tor update pipelines. Callers submit addresses and await the
//! answers through [`Query`] handles.

mod owner;
mod query;
mod signals;
mod state;
mod stores;


use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;

use crate::app::Lifecycle;
use crate::config::{Config, RUNTIME_STARTED_SERVICES};
use crate::error_handling::{EventKind, InitializationError, QueryError, StatsSnapshot};
use crate::geoip::{GeoLocation, MaxMindOpener, StoreOpener};
use crate::initialization::init_client;
use crate::updater::{GeoUpdater, TorUpdater};

use owner::LookupOwner;
use query::PendingQuery;

pub use query::Query;
pub(crate) use signals::ReloadTrigger;
pub(crate) use state::Shared;

/// A running geo lookup service.
///
/// Must be started from within a Tokio runtime. Dropping the handle cancels
/// every task; call [`shutdown`](Self::shutdown) to also wait for them.
///
/// # Examples
///
/// ```no_run
/// use geotor::{Config, GeoService};
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let service = GeoService::start(Config::default())?;
/// service.wait_until_loaded(Duration::from_secs(60)).await;
/// let location = service
///     .lookup("81.2.69.142".parse()?, Duration::from_secs(1))
///     .await?;
/// println!("{} (tor exit: {})", location.location, location.is_tor_exit());
/// service.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct GeoService {
    queries: mpsc::Sender<PendingQuery>,
    reload: ReloadTrigger,
    shared: Arc<Shared>,
    lifecycle: Lifecycle,
}

/// Configures collaborators before starting a [`GeoService`].
pub struct GeoServiceBuilder {
    config: Config,
    opener: Arc<dyn StoreOpener>,
    client: Option<Arc<reqwest::Client>>,
}

impl GeoServiceBuilder {
    /// Replaces the MaxMind store opener.
    pub fn store_opener(mut self, opener: Arc<dyn StoreOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// Shares an existing HTTP client with the update pipelines.
    pub fn http_client(mut self, client: Arc<reqwest::Client>) -> Self {
        self.client = Some(client);
        self
    }

    /// Spawns the lookup owner and every enabled pipeline.
    ///
    /// A reload is requested immediately, so databases already installed in
    /// `geo_db_path` are served without waiting for the first update cycle.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError::HttpClientError` if the HTTP client for
    /// the pipelines cannot be built.
    pub fn start(self) -> Result<GeoService, InitializationError> {
        let config = self.config;
        let needs_client = config.enable_geo_updates || config.enable_tor_updates;
        let client = match (self.client, needs_client) {
            (Some(client), _) => Some(client),
            (None, true) => Some(init_client(&config)?),
            (None, false) => None,
        };

        let shared = Arc::new(Shared::new());
        let (queries, query_receiver) = mpsc::channel(config.query_queue_capacity.max(1));
        let (reload, reload_receiver) = ReloadTrigger::channel(Arc::clone(&shared));
        let lifecycle = Lifecycle::new();

        reload.fire();
        let owner = LookupOwner::new(
            config.geo_db_path.clone(),
            self.opener,
            config.location_format.clone(),
            Arc::clone(&shared),
            query_receiver,
            reload_receiver,
        );
        lifecycle.spawn("lookup service", owner.run(lifecycle.token()));

        if let Some(client) = client {
            if config.enable_geo_updates {
                let updater = GeoUpdater::new(
                    &config,
                    Arc::clone(&client),
                    Arc::clone(&shared),
                    reload.clone(),
                );
                lifecycle.spawn("geo updater", updater.run(lifecycle.token()));
            }
            if config.enable_tor_updates {
                let updater = TorUpdater::new(&config, client, Arc::clone(&shared));
                lifecycle.spawn("tor updater", updater.run(lifecycle.token()));
            }
        }

        log::info!(
            "Geo service started {} of {} services",
            lifecycle.tracked(),
            RUNTIME_STARTED_SERVICES
        );

        Ok(GeoService {
            queries,
            reload,
            shared,
            lifecycle,
        })
    }
}

impl GeoService {
    /// Starts a service with the default MaxMind store opener.
    pub fn start(config: Config) -> Result<Self, InitializationError> {
        Self::builder(config).start()
    }

    pub fn builder(config: Config) -> GeoServiceBuilder {
        GeoServiceBuilder {
            config,
            opener: Arc::new(MaxMindOpener),
            client: None,
        }
    }

    /// Queues a lookup without blocking.
    ///
    /// # Errors
    ///
    /// `QueryError::QueueFull` when the intake queue is saturated, and
    /// `QueryError::ServiceStopped` after shutdown.
    pub fn submit(&self, ip: IpAddr) -> Result<Query, QueryError> {
        let (query, pending) = Query::new(ip);
        match self.queries.try_send(pending) {
            Ok(()) => Ok(query),
            Err(TrySendError::Full(_)) => {
                log::warn!("Unable to queue the geo request for {}", ip);
                self.shared.stats.increment(EventKind::QueueFull);
                Err(QueryError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(QueryError::ServiceStopped),
        }
    }

    /// Submits `ip` and waits up to `timeout` for the answer.
    pub async fn lookup(&self, ip: IpAddr, timeout: Duration) -> Result<GeoLocation, QueryError> {
        let deadline = Instant::now() + timeout;
        self.submit(ip)?.wait(deadline).await
    }

    /// True once both geo stores of the current generation are open.
    pub fn loaded(&self) -> bool {
        self.shared.is_loaded()
    }

    /// Waits until [`loaded`](Self::loaded) is true, `timeout` passes or the
    /// service shuts down.
    pub async fn wait_until_loaded(&self, timeout: Duration) -> bool {
        let mut loaded = self.shared.watch_loaded();
        let cancel = self.lifecycle.token();
        tokio::select! {
            biased;
            result = tokio::time::timeout(timeout, loaded.wait_for(|l| *l)) => {
                matches!(result, Ok(Ok(_)))
            }
            _ = cancel.cancelled() => self.loaded(),
        }
    }

    /// Requests a reload of the installed databases.
    ///
    /// Returns false when enough reloads are already pending.
    pub fn reload(&self) -> bool {
        self.reload.fire()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Number of background tasks still running.
    pub fn running_tasks(&self) -> usize {
        self.lifecycle.tracked()
    }

    /// Stops every task and waits for them. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
        log::info!("Geo service shut down");
    }
}
