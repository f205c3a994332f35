//! HTTP client initialization.
//!
//! Both update pipelines share one client, built here from the service configuration.

use std::sync::Arc;

use reqwest::ClientBuilder;

use crate::config::Config;

/// Initializes the HTTP client used by the update pipelines.
///
/// Creates a `reqwest::Client` configured with:
/// - User-Agent header from the configuration
/// - Per-request timeout from the configuration
///
/// # Errors
///
/// Returns a `reqwest::Error` if client creation fails.
pub fn init_client(config: &Config) -> Result<Arc<reqwest::Client>, reqwest::Error> {
    let client = ClientBuilder::new()
        .timeout(config.http_timeout)
        .user_agent(config.user_agent.clone())
        .build()?;
    Ok(Arc::new(client))
}
