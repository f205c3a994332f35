//! Tor exit list update pipeline.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use reqwest::Client;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error_handling::{EventKind, FetchError, TorParseError};
use crate::service::Shared;
use crate::tor::{parse_exit_stream, TorIndex, TorNode};

/// Rebuilds the Tor exit index and delivers it to the lookup service.
pub(crate) struct TorUpdater {
    client: Arc<Client>,
    url: String,
    interval: Duration,
    shared: Arc<Shared>,
}

#[derive(Debug)]
enum RefreshError {
    Fetch(FetchError),
    Parse(TorParseError),
}

impl TorUpdater {
    pub(crate) fn new(config: &Config, client: Arc<Client>, shared: Arc<Shared>) -> Self {
        Self {
            client,
            url: config.tor_url.clone(),
            interval: config.tor_update_interval,
            shared,
        }
    }

    pub(crate) async fn run(self, cancel: CancellationToken) {
        let this = &self;
        super::run_periodically("Tor updater", self.interval, cancel, move || async move {
            this.refresh().await;
        })
        .await;
    }

    /// Runs one cycle; returns true when a new index was published.
    ///
    /// On failure nothing is published and the service keeps its current index.
    pub(crate) async fn refresh(&self) -> bool {
        let nodes = match self.fetch_nodes().await {
            Ok(nodes) => nodes,
            Err(RefreshError::Fetch(e)) => {
                log::warn!("Unable to fetch tor exit list: {}", e);
                self.shared.stats.increment(EventKind::TorFetchFailed);
                return false;
            }
            Err(RefreshError::Parse(e)) => {
                log::warn!("Unable to parse tor exit list: {}", e);
                self.shared.stats.increment(EventKind::TorParseFailed);
                return false;
            }
        };

        let index = Arc::new(TorIndex::build(nodes));
        log::debug!("Built {}", index);
        if let Some(superseded) = self.shared.tor_mailbox.deliver(index) {
            log::debug!("Replaced undelivered {}", superseded);
        }
        self.shared.stats.increment(EventKind::TorIndexPublished);
        true
    }

    async fn fetch_nodes(&self) -> Result<Vec<TorNode>, RefreshError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|source| {
                RefreshError::Fetch(FetchError::Transport {
                    url: self.url.clone(),
                    source,
                })
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Fetch(FetchError::Status {
                url: self.url.clone(),
                status,
            }));
        }

        let body = StreamReader::new(Box::pin(response.bytes_stream().map_err(io::Error::other)));
        parse_exit_stream(body).await.map_err(RefreshError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::{routing::get, Router};
    use tokio::net::TcpListener;

    const EXIT_LIST: &str = "\
ExitNode 0011BD2485AD45D984EC4159C88FC066E5E3300E
Published 2017-05-06 09:05:24
LastStatus 2017-05-06 10:02:47
ExitAddress 162.247.72.201 2017-05-06 10:07:38
ExitNode 0091174DE56EADE6E8E12E1AC6D17B6E6F23E2B1
Published 2017-05-06 03:21:30
LastStatus 2017-05-06 04:02:35
ExitAddress 45.62.252.22 2017-05-06 04:03:39
ExitAddress 45.62.252.23 2017-05-06 04:03:39
";

    async fn start_list_server(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route("/exit-addresses", get(move || async move { (status, body) }));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Server failed to start");
        });
        format!("http://{}/exit-addresses", addr)
    }

    fn updater(url: String) -> (TorUpdater, Arc<Shared>) {
        let config = Config {
            tor_url: url,
            ..Default::default()
        };
        let shared = Arc::new(Shared::new());
        let updater = TorUpdater::new(&config, Arc::new(Client::new()), Arc::clone(&shared));
        (updater, shared)
    }

    #[tokio::test]
    async fn test_refresh_publishes_index() {
        let (updater, shared) = updater(start_list_server(StatusCode::OK, EXIT_LIST).await);

        assert!(updater.refresh().await);
        let index = shared.tor_mailbox.try_take().expect("published index");
        assert_eq!(index.count(), 3);
        assert_eq!(
            index.lookup("45.62.252.23".parse().unwrap()),
            Some("0091174DE56EADE6E8E12E1AC6D17B6E6F23E2B1")
        );
        assert_eq!(shared.stats.get(EventKind::TorIndexPublished), 1);
    }

    #[tokio::test]
    async fn test_malformed_list_publishes_nothing() {
        let body = "ExitNode ABC\nLastStatus 2017-05-06 10:02:47\n";
        let (updater, shared) = updater(start_list_server(StatusCode::OK, body).await);

        assert!(!updater.refresh().await);
        assert!(shared.tor_mailbox.try_take().is_none());
        assert_eq!(shared.stats.get(EventKind::TorParseFailed), 1);
    }

    #[tokio::test]
    async fn test_http_error_publishes_nothing() {
        let (updater, shared) =
            updater(start_list_server(StatusCode::SERVICE_UNAVAILABLE, "busy").await);

        assert!(!updater.refresh().await);
        assert!(shared.tor_mailbox.try_take().is_none());
        assert_eq!(shared.stats.get(EventKind::TorFetchFailed), 1);
    }

    #[tokio::test]
    async fn test_newer_refresh_supersedes_undelivered_index() {
        let (updater, shared) = updater(start_list_server(StatusCode::OK, EXIT_LIST).await);

        assert!(updater.refresh().await);
        assert!(updater.refresh().await);
        assert!(shared.tor_mailbox.try_take().is_some());
        assert!(shared.tor_mailbox.try_take().is_none());
        assert_eq!(shared.stats.get(EventKind::TorIndexPublished), 2);
    }
}
