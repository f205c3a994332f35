//! Configuration types.
//!
//! This module defines the library configuration and the logging options
//! shared with the CLI binary.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;

use crate::config::constants::{
    DEFAULT_GEO_DB_PATH, DEFAULT_USER_AGENT, HTTP_TIMEOUT, MAXMIND_DOWNLOAD_BASE,
    MAXMIND_UPDATE_INTERVAL, MAX_GEOIP_DOWNLOAD_SIZE, QUERY_QUEUE_CAPACITY, TOR_EXIT_LIST_URL,
    TOR_UPDATE_INTERVAL,
};
use crate::geoip::LocationFormat;

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Service configuration.
///
/// Constructed programmatically by the embedding application; the service never
/// reads process-wide configuration on its own.
///
/// # Examples
///
/// ```no_run
/// use geotor::Config;
/// use std::path::PathBuf;
///
/// let config = Config {
///     geo_db_path: PathBuf::from("/var/lib/geotor"),
///     maxmind_license_key: "YOUR_KEY".to_string(),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the versioned `.mmdb` files and the version record
    pub geo_db_path: PathBuf,

    /// MaxMind download endpoint (edition, suffix and key are added as query parameters)
    pub maxmind_download_base: String,

    /// MaxMind license key
    pub maxmind_license_key: String,

    /// Tor exit address list URL
    pub tor_url: String,

    /// Interval between MaxMind update checks
    pub maxmind_update_interval: Duration,

    /// Interval between Tor exit list refreshes
    pub tor_update_interval: Duration,

    /// Capacity of the query intake queue
    pub query_queue_capacity: usize,

    /// Timeout applied to every updater HTTP request
    pub http_timeout: Duration,

    /// Largest archive the geo updater will accept, in bytes
    pub max_download_size: u64,

    /// HTTP User-Agent header value
    pub user_agent: String,

    /// Run the MaxMind update pipeline
    pub enable_geo_updates: bool,

    /// Run the Tor exit list update pipeline
    pub enable_tor_updates: bool,

    /// Policy for composing localized location strings
    pub location_format: LocationFormat,
}

impl Default for Config {
    /// Daily MaxMind checks and hourly Tor checks.
    fn default() -> Self {
        Self {
            geo_db_path: PathBuf::from(DEFAULT_GEO_DB_PATH),
            maxmind_download_base: MAXMIND_DOWNLOAD_BASE.to_string(),
            maxmind_license_key: String::new(),
            tor_url: TOR_EXIT_LIST_URL.to_string(),
            maxmind_update_interval: MAXMIND_UPDATE_INTERVAL,
            tor_update_interval: TOR_UPDATE_INTERVAL,
            query_queue_capacity: QUERY_QUEUE_CAPACITY,
            http_timeout: HTTP_TIMEOUT,
            max_download_size: MAX_GEOIP_DOWNLOAD_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            enable_geo_updates: true,
            enable_tor_updates: true,
            location_format: LocationFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_log_level_maps_to_filter() {
        let pairs = [
            (LogLevel::Error, log::LevelFilter::Error),
            (LogLevel::Info, log::LevelFilter::Info),
            (LogLevel::Trace, log::LevelFilter::Trace),
        ];
        for (level, filter) in pairs {
            assert_eq!(log::LevelFilter::from(level), filter);
        }
    }

    #[test]
    fn test_default_config_matches_upstream_defaults() {
        let config = Config::default();
        assert_eq!(config.geo_db_path, PathBuf::from("/tmp"));
        assert_eq!(config.maxmind_update_interval, Duration::from_secs(86_400));
        assert_eq!(config.tor_update_interval, Duration::from_secs(3_600));
        assert_eq!(config.query_queue_capacity, 1024);
        assert!(config.maxmind_license_key.is_empty());
        assert!(config.enable_geo_updates);
        assert!(config.enable_tor_updates);
        assert_eq!(
            config.tor_url,
            "https://check.torproject.org/exit-addresses"
        );
    }
}
