//! Geo database stores.
//!
//! The lookup service only talks to databases through [`GeoStore`], and opens
//! them through [`StoreOpener`]. The MaxMind implementations below are the
//! production ones; tests substitute in-memory stores.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use maxminddb::Reader;
use serde::de::DeserializeOwned;

use super::types::{CityRecord, Isp};
use crate::error_handling::StoreError;

/// Keyed lookups against one opened database.
///
/// Implementations must be safe to query from many blocking tasks at once.
pub trait GeoStore: Send + Sync {
    fn lookup_city(&self, ip: IpAddr) -> Result<CityRecord, StoreError>;

    fn lookup_isp(&self, ip: IpAddr) -> Result<Isp, StoreError>;
}

/// Opens database files for the lookup service.
///
/// Called from a blocking task during reload, so it may perform file I/O.
pub trait StoreOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoStore>, StoreError>;
}

/// A MaxMind database read fully into memory.
pub struct MaxMindStore {
    reader: Reader<Vec<u8>>,
    path: PathBuf,
}

impl MaxMindStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = Reader::from_source(bytes).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::debug!(
            "Opened geo database {} (build {})",
            path.display(),
            reader.metadata.build_epoch
        );
        Ok(Self {
            reader,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode<T: DeserializeOwned>(&self, ip: IpAddr) -> Result<T, StoreError> {
        // maxminddb 0.27 API: lookup() yields a LookupResult; has_data() tells
        // whether the network is present, decode() yields Ok(None) for empty records
        let result = self
            .reader
            .lookup(ip)
            .map_err(|e| StoreError::Lookup(e.to_string()))?;
        if !result.has_data() {
            return Err(StoreError::NotFound(ip));
        }
        match result.decode::<T>() {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(StoreError::NotFound(ip)),
            Err(e) => Err(StoreError::Lookup(e.to_string())),
        }
    }
}

impl GeoStore for MaxMindStore {
    fn lookup_city(&self, ip: IpAddr) -> Result<CityRecord, StoreError> {
        self.decode(ip)
    }

    fn lookup_isp(&self, ip: IpAddr) -> Result<Isp, StoreError> {
        self.decode(ip)
    }
}

impl Drop for MaxMindStore {
    fn drop(&mut self) {
        log::debug!("Closed geo database {}", self.path.display());
    }
}

/// Opens `.mmdb` files with [`MaxMindStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMindOpener;

impl StoreOpener for MaxMindOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoStore>, StoreError> {
        Ok(Arc::new(MaxMindStore::open(path)?))
    }
}
