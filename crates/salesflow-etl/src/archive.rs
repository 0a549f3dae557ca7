//! Archiver
//!
//! Packs the normalized artifacts of a run into one gzip-compressed tar file
//! with a `MANIFEST.sha256` entry listing the digest of every packed file.
//! The merged dataset and raw inputs are not archived.

use flate2::write::GzEncoder;
use flate2::Compression;
use salesflow_common::checksum::{manifest_lines, sha256_file};
use salesflow_common::{EtlError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the digest listing inside every archive
pub const MANIFEST_NAME: &str = "MANIFEST.sha256";

/// What was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    /// Archived file names, manifest excluded
    pub entries: Vec<String>,
}

fn archive_error(context: &str, err: impl std::fmt::Display) -> EtlError {
    EtlError::Archive(format!("{}: {}", context, err))
}

/// Archive `artifacts` into `dest`.
///
/// Returns `Ok(None)` after logging a warning when there is nothing to
/// archive; that is not a failure.
pub fn archive_artifacts(artifacts: &[PathBuf], dest: &Path) -> Result<Option<ArchiveSummary>> {
    if artifacts.is_empty() {
        warn!(archive = %dest.display(), "No normalized artifacts to archive");
        return Ok(None);
    }

    let file = std::fs::File::create(dest)
        .map_err(|e| archive_error(&format!("cannot create {}", dest.display()), e))?;

    match write_archive(file, artifacts, dest) {
        Ok(entries) => {
            info!(
                archive = %dest.display(),
                files = entries.len(),
                "Archived normalized artifacts"
            );
            Ok(Some(ArchiveSummary {
                path: dest.to_path_buf(),
                entries,
            }))
        },
        Err(e) => {
            // A partial archive must not look like a finished one
            if let Err(remove) = std::fs::remove_file(dest) {
                warn!(archive = %dest.display(), error = %remove, "Cannot remove partial archive");
            }
            Err(e)
        },
    }
}

/// Pack every artifact plus the manifest into `file`, returning entry names
fn write_archive(file: std::fs::File, artifacts: &[PathBuf], dest: &Path) -> Result<Vec<String>> {
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut entries = Vec::with_capacity(artifacts.len());
    let mut digests = Vec::with_capacity(artifacts.len());

    for path in artifacts {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| EtlError::Archive(format!("{} has no file name", path.display())))?;

        let digest = sha256_file(path)
            .map_err(|e| archive_error(&format!("cannot hash {}", path.display()), e))?;
        builder
            .append_path_with_name(path, &name)
            .map_err(|e| archive_error(&format!("cannot add {}", path.display()), e))?;

        digests.push(digest);
        entries.push(name);
    }

    let manifest = manifest_lines(
        entries
            .iter()
            .map(String::as_str)
            .zip(digests.iter().map(String::as_str)),
    );
    let mut header = tar::Header::new_gnu();
    header.set_size(manifest.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
    );
    header.set_cksum();
    builder
        .append_data(&mut header, MANIFEST_NAME, manifest.as_bytes())
        .map_err(|e| archive_error("cannot add manifest", e))?;

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| archive_error(&format!("cannot finish {}", dest.display()), e))?;

    Ok(entries)
}
