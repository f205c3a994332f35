//! geotor library: IP geolocation with Tor exit-node detection
//!
//! This library answers "where is this address, who operates it, and is it a
//! Tor exit?" from MaxMind GeoIP2 City and ISP databases plus the published
//! Tor exit list. Both datasets are refreshed in the background and swapped in
//! without ever exposing a partially updated view to a query.
//!
//! # Example
//!
//! ```no_run
//! use geotor::{Config, GeoService};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     geo_db_path: std::path::PathBuf::from("/var/lib/geotor"),
//!     maxmind_license_key: std::env::var("MAXMIND_LICENSE_KEY")?,
//!     ..Default::default()
//! };
//!
//! let service = GeoService::start(config)?;
//! if service.wait_until_loaded(Duration::from_secs(120)).await {
//!     let location = service
//!         .lookup("81.2.69.142".parse()?, Duration::from_secs(1))
//!         .await?;
//!     println!("{} (tor exit: {})", location.location, location.is_tor_exit());
//! }
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! The service spawns its tasks on the ambient Tokio runtime, so it must be
//! started from within an async context.

mod app;
pub mod config;
pub mod error_handling;
pub mod geoip;
pub mod initialization;
mod service;
pub mod tor;
mod updater;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use error_handling::{EventKind, QueryError, StatsSnapshot};
pub use geoip::{GeoLocation, LocationFormat};
pub use service::{GeoService, GeoServiceBuilder, Query};
pub use tor::{TorIndex, TorNode};
