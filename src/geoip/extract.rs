//! Archive extraction utilities.
//!
//! This module streams the `.mmdb` member of a MaxMind tar.gz archive onto its
//! versioned path on disk.

use std::ffi::OsString;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::config::MMDB_EXTENSION;
use crate::error_handling::ArchiveError;

/// Writes the first `.mmdb` member of a tar.gz archive to `target`.
///
/// The member is streamed to `<target>.partial`, synced, then renamed onto
/// `target`, so `target` either does not exist or holds the complete file.
/// Returns the number of bytes written.
pub(crate) fn extract_mmdb_to(
    tar_gz: impl Read,
    product: &str,
    target: &Path,
) -> Result<u64, ArchiveError> {
    let io_err = |source| ArchiveError::Io {
        product: product.to_string(),
        source,
    };

    let mut archive = Archive::new(GzDecoder::new(tar_gz));
    let entries = archive.entries().map_err(io_err)?;

    for entry_result in entries {
        let mut entry = entry_result.map_err(io_err)?;
        let path = entry.path().map_err(io_err)?.into_owned();
        if !path.to_string_lossy().ends_with(MMDB_EXTENSION) {
            continue;
        }

        log::debug!(
            "Found DB file: {} ({} bytes), writing to {}",
            path.display(),
            entry.header().size().unwrap_or_default(),
            target.display()
        );
        let staging = partial_path(target);
        return write_member(&mut entry, &staging, target).map_err(|source| {
            let _ = std::fs::remove_file(&staging);
            io_err(source)
        });
    }

    Err(ArchiveError::MissingDatabase {
        product: product.to_string(),
    })
}

fn write_member(member: &mut impl Read, staging: &Path, target: &Path) -> std::io::Result<u64> {
    let mut file = File::create(staging)?;
    let size = std::io::copy(member, &mut file)?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(staging, target)?;
    Ok(size)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}
