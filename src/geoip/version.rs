//! Persisted record of the installed database versions.
//!
//! The record is the single source of truth for which versioned `.mmdb` files
//! are valid on disk. It is rewritten only after a database file has been
//! fully written, and always through a temporary file plus rename so readers
//! never observe a half-written record.

use std::io;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::types::Product;
use crate::config::VERSION_DATA_FILENAME;

/// Longest checksum accepted from the download endpoint or the record.
const MAX_CHECKSUM_LEN: usize = 128;

/// A checksum is 1..=128 ASCII alphanumerics, so it is always safe to embed
/// in a file name.
pub(crate) fn is_valid_checksum(checksum: &str) -> bool {
    !checksum.is_empty()
        && checksum.len() <= MAX_CHECKSUM_LEN
        && checksum.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Installed checksum per product; empty means not installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionData {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub isp: String,
}

impl VersionData {
    /// Location of the record inside the database directory.
    pub fn path(db_dir: &Path) -> PathBuf {
        db_dir.join(VERSION_DATA_FILENAME)
    }

    pub fn checksum(&self, product: Product) -> &str {
        match product {
            Product::City => &self.city,
            Product::Isp => &self.isp,
        }
    }

    pub fn set_checksum(&mut self, product: Product, checksum: &str) {
        let slot = match product {
            Product::City => &mut self.city,
            Product::Isp => &mut self.isp,
        };
        *slot = checksum.to_string();
    }

    /// Path of the installed database for `product`, if a valid checksum is recorded.
    pub fn database_path(&self, db_dir: &Path, product: Product) -> Option<PathBuf> {
        let checksum = self.checksum(product);
        is_valid_checksum(checksum).then(|| db_dir.join(product.file_name(checksum)))
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Decodes a record, rejecting any recorded checksum that could not have
    /// come from the download endpoint.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        let version: Self = serde_json::from_slice(bytes)?;
        for product in [Product::City, Product::Isp] {
            let checksum = version.checksum(product);
            if !checksum.is_empty() && !is_valid_checksum(checksum) {
                return Err(serde_json::Error::custom(format!(
                    "invalid {} checksum {:?}",
                    product, checksum
                )));
            }
        }
        Ok(version)
    }

    /// Reads the record from `db_dir`.
    pub async fn load(db_dir: &Path) -> io::Result<Self> {
        let bytes = tokio::fs::read(Self::path(db_dir)).await?;
        Self::decode(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Reads the record, treating a missing or unreadable one as empty.
    pub async fn load_or_default(db_dir: &Path) -> Self {
        match Self::load(db_dir).await {
            Ok(version) => version,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!(
                    "Unreadable version record in {}, treating as empty: {}",
                    db_dir.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Durably replaces the record in `db_dir`.
    pub async fn save(&self, db_dir: &Path) -> io::Result<()> {
        let bytes = self
            .encode()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let target = Self::path(db_dir);
        let staging = db_dir.join(format!("{}.tmp", VERSION_DATA_FILENAME));

        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&staging, &target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_decode_round_trip() {
        let version = VersionData {
            city: "abc".into(),
            isp: "def".into(),
        };
        let bytes = version.encode().expect("encode");
        assert_eq!(VersionData::decode(&bytes).expect("decode"), version);
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        let version = VersionData::decode(b"{\"city\":\"abc\"}").expect("decode");
        assert_eq!(version.city, "abc");
        assert!(version.isp.is_empty());
    }

    #[test]
    fn test_decode_rejects_path_like_checksums() {
        for record in [
            &b"{\"city\":\"../../etc/passwd\",\"isp\":\"def\"}"[..],
            b"{\"city\":\"abc\",\"isp\":\"a/b\"}",
            b"{\"city\":\"abc\",\"isp\":\"..\"}",
        ] {
            assert!(VersionData::decode(record).is_err());
        }
    }

    #[test]
    fn test_database_path_ignores_invalid_checksum() {
        let version = VersionData {
            city: "../outside".into(),
            isp: "def".into(),
        };
        let dir = Path::new("/data");
        assert_eq!(version.database_path(dir, Product::City), None);
        assert!(version.database_path(dir, Product::Isp).is_some());
    }

    #[tokio::test]
    async fn test_tampered_record_loads_as_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        tokio::fs::write(
            VersionData::path(temp_dir.path()),
            b"{\"city\":\"../../tmp/x\",\"isp\":\"def\"}",
        )
        .await
        .expect("write tampered record");
        assert_eq!(
            VersionData::load_or_default(temp_dir.path()).await,
            VersionData::default()
        );
    }

    #[test]
    fn test_database_path() {
        let version = VersionData {
            city: "abc".into(),
            isp: String::new(),
        };
        let dir = Path::new("/data");
        assert_eq!(
            version.database_path(dir, Product::City),
            Some(PathBuf::from("/data/GeoIP2-City-abc.mmdb"))
        );
        assert_eq!(version.database_path(dir, Product::Isp), None);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut version = VersionData::default();
        version.set_checksum(Product::City, "abc");
        version.set_checksum(Product::Isp, "def");

        version.save(temp_dir.path()).await.expect("save");
        assert!(VersionData::path(temp_dir.path()).exists());
        assert!(!temp_dir.path().join("geotor.version.tmp").exists());

        let loaded = VersionData::load(temp_dir.path()).await.expect("load");
        assert_eq!(loaded, version);
        assert_eq!(loaded.checksum(Product::Isp), "def");
    }

    #[tokio::test]
    async fn test_load_or_default_on_missing_and_corrupt() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        assert_eq!(
            VersionData::load_or_default(temp_dir.path()).await,
            VersionData::default()
        );

        tokio::fs::write(VersionData::path(temp_dir.path()), b"{ invalid json }")
            .await
            .expect("write corrupt record");
        assert!(VersionData::load(temp_dir.path()).await.is_err());
        assert_eq!(
            VersionData::load_or_default(temp_dir.path()).await,
            VersionData::default()
        );
    }
}
