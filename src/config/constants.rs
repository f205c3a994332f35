//! Configuration constants.
//!
//! This module defines the constants used throughout the service, including
//! queue capacities, file naming, remote endpoints and size limits.

use std::time::Duration;

/// Number of long-running tasks started by the service (lookup owner, geo
/// updater, Tor updater).
pub const RUNTIME_STARTED_SERVICES: usize = 3;

/// Default capacity of the query intake queue.
/// Submissions beyond this many unconsumed queries are rejected with `QueueFull`.
pub const QUERY_QUEUE_CAPACITY: usize = 1024;

/// Capacity of the reload trigger channel.
/// Startup reload plus one pending reload after an updater run.
pub const RELOAD_QUEUE_CAPACITY: usize = 2;

/// File name of the persisted version record inside the database directory.
pub const VERSION_DATA_FILENAME: &str = "geotor.version";

/// MaxMind edition id of the city database.
pub const CITY_PRODUCT: &str = "GeoIP2-City";

/// MaxMind edition id of the ISP database.
pub const ISP_PRODUCT: &str = "GeoIP2-ISP";

/// Body MaxMind returns in place of a checksum when the license key is rejected.
pub const INVALID_LICENSE_KEY_RESPONSE: &str = "Invalid license key\n";

/// Suffix requested for checksum downloads.
pub const CHECKSUM_SUFFIX: &str = "tar.gz.md5";

/// Suffix requested for archive downloads.
pub const ARCHIVE_SUFFIX: &str = "tar.gz";

/// Extension of a database member inside the downloaded archive.
pub const MMDB_EXTENSION: &str = ".mmdb";

/// MaxMind download base URL
pub const MAXMIND_DOWNLOAD_BASE: &str = "https://download.maxmind.com/app/geoip_download";

/// Public Tor exit address list
pub const TOR_EXIT_LIST_URL: &str = "https://check.torproject.org/exit-addresses";

/// Environment variable name for MaxMind license key
pub const MAXMIND_LICENSE_KEY_ENV: &str = "MAXMIND_LICENSE_KEY";

/// Default interval between MaxMind update checks (daily)
pub const MAXMIND_UPDATE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between Tor exit list refreshes (hourly)
pub const TOR_UPDATE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// HTTP timeout for updater requests.
/// Generous because the city archive is tens of megabytes.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum accepted archive download size in bytes (512MB)
pub const MAX_GEOIP_DOWNLOAD_SIZE: u64 = 512 * 1024 * 1024;

/// Maximum accepted checksum response size in bytes
pub const MAX_CHECKSUM_RESPONSE_SIZE: usize = 256;

/// Default User-Agent for updater requests.
pub const DEFAULT_USER_AGENT: &str = concat!("geotor/", env!("CARGO_PKG_VERSION"));

/// Default directory holding versioned database files.
pub const DEFAULT_GEO_DB_PATH: &str = "/tmp";
