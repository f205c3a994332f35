//! The lookup service owner task.
//!
//! One task owns the loaded stores and the Tor index. It handles queries,
//! reload triggers and index deliveries strictly one at a time, so swapping
//! stores never races with dispatching a query.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::query::PendingQuery;
use super::state::Shared;
use super::stores::LoadedStores;
use crate::error_handling::{EventKind, QueryError, StoreError};
use crate::geoip::{resolve, GeoStore, LocationFormat, Product, StoreOpener, VersionData};
use crate::tor::TorIndex;

pub(crate) struct LookupOwner {
    db_dir: PathBuf,
    opener: Arc<dyn StoreOpener>,
    format: Arc<LocationFormat>,
    shared: Arc<Shared>,
    queries: mpsc::Receiver<PendingQuery>,
    reloads: mpsc::Receiver<()>,
    stores: Option<Arc<LoadedStores>>,
    tor: Option<Arc<TorIndex>>,
    generation: u64,
}

impl LookupOwner {
    pub(crate) fn new(
        db_dir: PathBuf,
        opener: Arc<dyn StoreOpener>,
        format: LocationFormat,
        shared: Arc<Shared>,
        queries: mpsc::Receiver<PendingQuery>,
        reloads: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            db_dir,
            opener,
            format: Arc::new(format),
            shared,
            queries,
            reloads,
            stores: None,
            tor: None,
            generation: 0,
        }
    }

    pub(crate) async fn run(mut self, cancel: CancellationToken) {
        loop {
            let loaded = self.stores.is_some();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(()) = self.reloads.recv() => self.reload().await,
                index = self.shared.tor_mailbox.recv() => self.install_tor_index(index),
                Some(query) = self.queries.recv(), if loaded => self.dispatch(query),
            }
        }

        self.shared.set_loaded(false);
        log::info!("Lookup service stopped");
    }

    /// Opens the pair named by the version record and swaps it in.
    ///
    /// Both stores must open. Otherwise the current pair is released and the
    /// service stays unloaded until the next successful reload.
    async fn reload(&mut self) {
        let version = VersionData::load_or_default(&self.db_dir).await;
        let db_dir = self.db_dir.clone();
        let opener = Arc::clone(&self.opener);
        let opened =
            tokio::task::spawn_blocking(move || open_pair(opener.as_ref(), &db_dir, &version))
                .await
                .unwrap_or_else(|e| Err(StoreError::Lookup(format!("reload task failed: {}", e))));

        match opened {
            Ok((city, isp)) => {
                self.generation += 1;
                self.stores = Some(Arc::new(LoadedStores::new(
                    self.generation,
                    city,
                    isp,
                    Arc::clone(&self.shared),
                )));
                self.shared.set_loaded(true);
                self.shared.stats.increment(EventKind::ReloadSucceeded);
                log::info!("Loaded geo databases, generation {}", self.generation);
            }
            Err(e) => {
                self.stores = None;
                self.shared.set_loaded(false);
                self.shared.stats.increment(EventKind::ReloadFailed);
                log::error!("Reload failure: {}", e);
            }
        }
    }

    fn install_tor_index(&mut self, index: Arc<TorIndex>) {
        log::info!("Loaded {}", index);
        self.tor = Some(index);
    }

    /// Hands one query to a blocking task holding its own store references.
    fn dispatch(&self, query: PendingQuery) {
        let Some(stores) = self.stores.clone() else {
            query.respond(Err(QueryError::Lookup("geo databases not loaded".into())));
            return;
        };
        let tor = self.tor.clone();
        let format = Arc::clone(&self.format);
        let shared = Arc::clone(&self.shared);

        tokio::task::spawn_blocking(move || {
            if !query.is_live() {
                log::debug!("Skipping cancelled geo request for {}", query.ip);
                shared.stats.increment(EventKind::QuerySkipped);
                return;
            }

            let result = resolve(
                query.ip,
                stores.city.as_ref(),
                stores.isp.as_ref(),
                tor.as_deref(),
                &format,
            );
            match result {
                Ok(location) => {
                    shared.stats.increment(EventKind::QueryAnswered);
                    query.respond(Ok(location));
                }
                Err(e) => {
                    shared.stats.increment(EventKind::QueryLookupFailed);
                    query.respond(Err(QueryError::Lookup(e.to_string())));
                }
            }
        });
    }
}

type StorePair = (Arc<dyn GeoStore>, Arc<dyn GeoStore>);

fn open_pair(
    opener: &dyn StoreOpener,
    db_dir: &std::path::Path,
    version: &VersionData,
) -> Result<StorePair, StoreError> {
    let open = |product: Product| {
        let path = version
            .database_path(db_dir, product)
            .ok_or_else(|| StoreError::NotInstalled {
                product: product.to_string(),
            })?;
        opener.open(&path)
    };

    // A city store opened before the ISP open fails is dropped here
    let city = open(Product::City)?;
    let isp = open(Product::Isp)?;
    Ok((city, isp))
}
