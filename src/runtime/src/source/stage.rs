//! Workspace staging.

use std::path::Path;

use async_trait::async_trait;
use oci_publish_core::error::{PublishError, Result};

use super::Stager;

/// Top-level directories never copied into a package.
pub const EXCLUDED_DIRS: &[&str] = &[".git", ".github"];

/// Copies the workspace into the staging directory on the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FsStager;

impl FsStager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stager for FsStager {
    async fn stage(&self, source: &Path, staging_dir: &Path) -> Result<()> {
        let source = source.to_path_buf();
        let staging_dir = staging_dir.to_path_buf();

        tokio::task::spawn_blocking(move || copy_tree(&source, &staging_dir))
            .await
            .map_err(|e| PublishError::Collaborator(format!("Staging task failed: {}", e)))?
    }
}

fn copy_tree(source: &Path, staging_dir: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(PublishError::Collaborator(format!(
            "Workspace {} is not a directory",
            source.display()
        )));
    }

    let entries = std::fs::read_dir(source).map_err(|e| {
        PublishError::Collaborator(format!(
            "Failed to read directory {}: {}",
            source.display(),
            e
        ))
    })?;

    let mut copied = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| {
            PublishError::Collaborator(format!("Failed to read directory entry: {}", e))
        })?;
        let name = entry.file_name();
        if EXCLUDED_DIRS.iter().any(|d| name == *d) {
            continue;
        }
        copy_entry(&entry.path(), &staging_dir.join(&name))?;
        copied += 1;
    }

    tracing::debug!(
        source = %source.display(),
        staging = %staging_dir.display(),
        entries = copied,
        "Staged workspace"
    );
    Ok(())
}

/// Copy a file or directory tree. Symbolic links are skipped, never followed.
fn copy_entry(from: &Path, to: &Path) -> Result<()> {
    let file_type = std::fs::symlink_metadata(from)
        .map_err(|e| {
            PublishError::Collaborator(format!("Failed to inspect {}: {}", from.display(), e))
        })?
        .file_type();

    if file_type.is_symlink() {
        tracing::warn!(path = %from.display(), "Skipping symbolic link");
        return Ok(());
    }

    if file_type.is_dir() {
        std::fs::create_dir_all(to).map_err(|e| {
            PublishError::Collaborator(format!(
                "Failed to create directory {}: {}",
                to.display(),
                e
            ))
        })?;
        let entries = std::fs::read_dir(from).map_err(|e| {
            PublishError::Collaborator(format!(
                "Failed to read directory {}: {}",
                from.display(),
                e
            ))
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                PublishError::Collaborator(format!("Failed to read directory entry: {}", e))
            })?;
            copy_entry(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        std::fs::copy(from, to).map_err(|e| {
            PublishError::Collaborator(format!(
                "Failed to copy {} to {}: {}",
                from.display(),
                to.display(),
                e
            ))
        })?;
    }
    Ok(())
}
