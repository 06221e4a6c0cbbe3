//! Source tree collaborators.
//!
//! The publisher only sees these traits. Default implementations check the
//! git checkout, copy the workspace into a staging directory and produce the
//! `action.tar.gz` / `action.zip` archives.

mod archive;
mod checkout;
mod stage;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use oci_publish_core::error::{PublishError, Result};

use crate::oci::FileMetadata;

pub use archive::{FsArchiver, TAR_ARCHIVE_NAME, ZIP_ARCHIVE_NAME};
pub use checkout::GitCheckout;
pub use stage::{FsStager, EXCLUDED_DIRS};

/// The two archives of an action package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSet {
    pub zip: FileMetadata,
    pub tar: FileMetadata,
}

/// Confirms the workspace is checked out at the released tag.
#[async_trait]
pub trait CheckoutVerifier: Send + Sync {
    async fn ensure_checked_out(&self, workspace: &Path, tag: &str) -> Result<()>;
}

/// Copies the action sources into a staging directory.
#[async_trait]
pub trait Stager: Send + Sync {
    async fn stage(&self, source: &Path, staging_dir: &Path) -> Result<()>;
}

/// Produces the package archives from a staged tree.
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn create_archives(&self, staging_dir: &Path, archive_dir: &Path) -> Result<ArchiveSet>;
}

/// Sorted relative paths of every file and directory under `root`.
/// Symbolic links are left out.
pub(crate) fn collect_entries(root: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    walk(root, root, &mut entries)?;
    entries.sort();
    Ok(entries)
}

fn walk(root: &Path, current: &Path, entries: &mut Vec<PathBuf>) -> Result<()> {
    let read_dir = std::fs::read_dir(current).map_err(|e| {
        PublishError::Collaborator(format!(
            "Failed to read directory {}: {}",
            current.display(),
            e
        ))
    })?;

    for entry in read_dir {
        let entry = entry.map_err(|e| {
            PublishError::Collaborator(format!("Failed to read directory entry: {}", e))
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| {
            PublishError::Collaborator(format!("Failed to inspect {}: {}", path.display(), e))
        })?;
        if file_type.is_symlink() {
            tracing::warn!(path = %path.display(), "Skipping symbolic link");
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|e| PublishError::Collaborator(format!("Failed to strip prefix: {}", e)))?
            .to_path_buf();

        entries.push(relative);
        if file_type.is_dir() {
            walk(root, &path, entries)?;
        }
    }

    Ok(())
}
