//! GeoIP lookup using MaxMind GeoIP2 databases.
//!
//! This module covers everything on the database side of the service: the
//! store abstraction over `maxminddb`, the persisted version record, archive
//! extraction for the updater, and assembly of [`GeoLocation`] responses.

mod extract;
mod location;
mod lookup;
mod store;
mod types;
mod version;

// Re-export public API
pub use location::LocationFormat;
pub use lookup::resolve;
pub use store::{GeoStore, MaxMindOpener, MaxMindStore, StoreOpener};
pub use types::{CityRecord, Country, GeoLocation, Isp, Names, Position, Product};
pub use version::VersionData;

pub(crate) use extract::extract_mmdb_to;
pub(crate) use version::is_valid_checksum;

#[cfg(test)]
pub(crate) use extract::tests::create_test_tar_gz;
