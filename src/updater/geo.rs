//! MaxMind database update pipeline.
//!
//! Each cycle checks the remote checksum of every product against the version
//! record, downloads and installs changed ones, and asks the lookup service
//! to reload when there is something new to serve.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::{Client, Response};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{
    Config, ARCHIVE_SUFFIX, CHECKSUM_SUFFIX, INVALID_LICENSE_KEY_RESPONSE,
    MAX_CHECKSUM_RESPONSE_SIZE,
};
use crate::error_handling::{EventKind, FetchError, UpdateError};
use crate::geoip::{extract_mmdb_to, is_valid_checksum, Product, VersionData};
use crate::service::{ReloadTrigger, Shared};

const REDACTED: &str = "REDACTED";

/// Outcome counts of one update cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CycleReport {
    pub(crate) installed: usize,
    pub(crate) up_to_date: usize,
    pub(crate) failed: usize,
}

impl CycleReport {
    /// A reload is worth it after an install, or when an unloaded service
    /// already has valid files on disk.
    pub(crate) fn should_reload(&self, loaded: bool) -> bool {
        self.installed > 0 || (!loaded && self.up_to_date > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProductOutcome {
    Installed,
    UpToDate,
}

/// Installs new MaxMind database versions into the database directory.
pub(crate) struct GeoUpdater {
    client: Arc<Client>,
    db_dir: PathBuf,
    download_base: String,
    license_key: String,
    interval: Duration,
    max_download_size: u64,
    shared: Arc<Shared>,
    reload: ReloadTrigger,
}

impl GeoUpdater {
    pub(crate) fn new(
        config: &Config,
        client: Arc<Client>,
        shared: Arc<Shared>,
        reload: ReloadTrigger,
    ) -> Self {
        Self {
            client,
            db_dir: config.geo_db_path.clone(),
            download_base: config.maxmind_download_base.clone(),
            license_key: config.maxmind_license_key.clone(),
            interval: config.maxmind_update_interval,
            max_download_size: config.max_download_size,
            shared,
            reload,
        }
    }

    pub(crate) async fn run(self, cancel: CancellationToken) {
        let this = &self;
        super::run_periodically("Geo updater", self.interval, cancel, move || async move {
            this.run_cycle().await;
        })
        .await;
    }

    /// Processes every product once; a failure on one never stops the other.
    pub(crate) async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        if let Err(e) = tokio::fs::create_dir_all(&self.db_dir).await {
            log::error!(
                "Unable to create geo database directory {}: {}",
                self.db_dir.display(),
                e
            );
            report.failed = Product::ALL.len();
            return report;
        }

        let mut version = VersionData::load_or_default(&self.db_dir).await;
        for product in Product::ALL {
            match self.update_product(product, &mut version).await {
                Ok(ProductOutcome::Installed) => {
                    report.installed += 1;
                    self.shared.stats.increment(EventKind::GeoInstalled);
                }
                Ok(ProductOutcome::UpToDate) => {
                    report.up_to_date += 1;
                    self.shared.stats.increment(EventKind::GeoUpToDate);
                }
                Err(e) => {
                    report.failed += 1;
                    self.record_failure(product, &e);
                }
            }
        }

        if report.should_reload(self.shared.is_loaded()) {
            self.reload.fire();
        }
        log::debug!("Geo update cycle finished: {:?}", report);
        report
    }

    async fn update_product(
        &self,
        product: Product,
        version: &mut VersionData,
    ) -> Result<ProductOutcome, UpdateError> {
        let checksum = self.fetch_checksum(product).await?;
        let installed = version.checksum(product).to_string();
        let target = self.db_dir.join(product.file_name(&checksum));

        if checksum == installed {
            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                log::debug!("{} is up to date ({})", product, checksum);
                return Ok(ProductOutcome::UpToDate);
            }
            log::warn!(
                "{} is missing from disk, downloading it again",
                target.display()
            );
        }

        self.install(product, &target).await?;
        version.set_checksum(product, &checksum);
        version
            .save(&self.db_dir)
            .await
            .map_err(|source| UpdateError::Version {
                path: VersionData::path(&self.db_dir),
                source,
            })?;

        if !installed.is_empty() && installed != checksum {
            remove_stale(&self.db_dir.join(product.file_name(&installed))).await;
        }
        log::info!("Installed {} version {}", product, checksum);
        Ok(ProductOutcome::Installed)
    }

    /// Fetches the published checksum of the latest `product` archive.
    async fn fetch_checksum(&self, product: Product) -> Result<String, FetchError> {
        let (url, shown) = self.endpoint(product, CHECKSUM_SUFFIX)?;
        let response = self.send(url, &shown).await?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Body {
                url: shown.clone(),
                source: source.without_url(),
            })?;

        // MaxMind reports a bad key in the body, and not always with a 401
        if body.as_ref() == INVALID_LICENSE_KEY_RESPONSE.as_bytes() {
            return Err(FetchError::InvalidCredential {
                product: product.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status { url: shown, status });
        }
        parse_checksum(product, &body)
    }

    /// Downloads the archive for `product` and writes its database to `target`.
    async fn install(&self, product: Product, target: &Path) -> Result<(), UpdateError> {
        let (url, shown) = self.endpoint(product, ARCHIVE_SUFFIX)?;
        let response = self.send(url, &shown).await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: shown,
                status: response.status(),
            }
            .into());
        }
        let archive = self.read_capped(response, &shown).await?;
        log::debug!("Downloaded {} archive ({} bytes)", product, archive.len());

        let edition = product.edition();
        let target = target.to_path_buf();
        let size = tokio::task::spawn_blocking(move || {
            extract_mmdb_to(archive.as_slice(), edition, &target)
        })
        .await
        .map_err(|source| UpdateError::Task {
            product: edition.to_string(),
            source,
        })??;
        log::debug!("Wrote {} database ({} bytes)", product, size);
        Ok(())
    }

    async fn send(&self, url: Url, shown: &str) -> Result<Response, FetchError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: shown.to_string(),
                source: source.without_url(),
            })
    }

    /// Buffers the body, refusing anything over the configured limit.
    async fn read_capped(&self, response: Response, shown: &str) -> Result<Vec<u8>, FetchError> {
        let max = self.max_download_size;
        let too_large = |size| FetchError::TooLarge {
            url: shown.to_string(),
            size,
            max,
        };

        if let Some(length) = response.content_length() {
            if length > max {
                return Err(too_large(length));
            }
        }

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Body {
                url: shown.to_string(),
                source: source.without_url(),
            })?;
            let size = (body.len() + chunk.len()) as u64;
            if size > max {
                return Err(too_large(size));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    /// Builds the download URL plus a copy safe to log.
    fn endpoint(&self, product: Product, suffix: &str) -> Result<(Url, String), FetchError> {
        let build = |key: &str| {
            Url::parse_with_params(
                &self.download_base,
                &[
                    ("edition_id", product.edition()),
                    ("suffix", suffix),
                    ("license_key", key),
                ],
            )
        };
        let invalid = |source| FetchError::InvalidUrl {
            url: self.download_base.clone(),
            source,
        };
        let url = build(&self.license_key).map_err(invalid)?;
        let shown = build(REDACTED).map_err(invalid)?;
        Ok((url, shown.to_string()))
    }

    fn record_failure(&self, product: Product, error: &UpdateError) {
        let kind = match error {
            UpdateError::Fetch(FetchError::InvalidCredential { .. }) => {
                EventKind::GeoCredentialRejected
            }
            UpdateError::Fetch(_) => EventKind::GeoFetchFailed,
            UpdateError::Archive(_) => EventKind::GeoArchiveFailed,
            UpdateError::Version { .. } | UpdateError::Task { .. } => EventKind::GeoInstallFailed,
        };
        self.shared.stats.increment(kind);

        if kind == EventKind::GeoInstallFailed {
            log::error!("Unable to install {}: {}", product, error);
        } else {
            log::warn!("Unable to update {}: {}", product, error);
        }
    }
}

/// Trims the checksum body and checks it is usable in a file name.
fn parse_checksum(product: Product, body: &[u8]) -> Result<String, FetchError> {
    let malformed = || FetchError::MalformedChecksum {
        product: product.to_string(),
        checksum: String::from_utf8_lossy(&body[..body.len().min(MAX_CHECKSUM_RESPONSE_SIZE)])
            .into_owned(),
    };
    if body.len() > MAX_CHECKSUM_RESPONSE_SIZE {
        return Err(malformed());
    }

    let checksum = std::str::from_utf8(body).map_err(|_| malformed())?.trim();
    if !is_valid_checksum(checksum) {
        return Err(malformed());
    }
    Ok(checksum.to_string())
}

async fn remove_stale(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::info!("Removed old database {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Unable to remove old database {}: {}", path.display(), e),
    }
}
