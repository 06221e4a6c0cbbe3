//! Scratch directories owned by a single publish run.

use std::path::{Path, PathBuf};

use oci_publish_core::error::{PublishError, Result};
use tempfile::TempDir;

/// Temporary directories created during a run.
///
/// Every directory is tracked the moment it is created and removed by
/// [`ScratchDirs::cleanup`], whatever the outcome of the run.
#[derive(Debug)]
pub struct ScratchDirs {
    root: PathBuf,
    dirs: Vec<TempDir>,
}

impl ScratchDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs: Vec::new(),
        }
    }

    /// Create and track a fresh directory under the root.
    pub fn create(&mut self, prefix: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            PublishError::Collaborator(format!(
                "Failed to create temp root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", prefix))
            .tempdir_in(&self.root)
            .map_err(|e| {
                PublishError::Collaborator(format!(
                    "Failed to create {} directory in {}: {}",
                    prefix,
                    self.root.display(),
                    e
                ))
            })?;

        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "Created scratch directory");
        self.dirs.push(dir);
        Ok(path)
    }

    /// Paths currently tracked.
    pub fn paths(&self) -> Vec<&Path> {
        self.dirs.iter().map(|d| d.path()).collect()
    }

    /// Remove every tracked directory. Failures are logged, never returned.
    pub fn cleanup(&mut self) {
        for dir in self.dirs.drain(..) {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed scratch directory"),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                ),
            }
        }
    }
}

impl Drop for ScratchDirs {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_cleanup() {
        let root = TempDir::new().unwrap();
        let mut scratch = ScratchDirs::new(root.path());

        let staging = scratch.create("staging").unwrap();
        let archives = scratch.create("archives").unwrap();
        std::fs::write(staging.join("file.txt"), "x").unwrap();

        assert!(staging.starts_with(root.path()));
        assert!(staging.is_dir() && archives.is_dir());
        assert_eq!(scratch.paths().len(), 2);

        scratch.cleanup();
        assert!(!staging.exists());
        assert!(!archives.exists());
        assert!(scratch.paths().is_empty());
    }

    #[test]
    fn test_cleanup_tolerates_already_removed_dir() {
        let root = TempDir::new().unwrap();
        let mut scratch = ScratchDirs::new(root.path());
        let dir = scratch.create("staging").unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        scratch.cleanup();
        assert!(scratch.paths().is_empty());
    }

    #[test]
    fn test_drop_removes_dirs() {
        let root = TempDir::new().unwrap();
        let dir = {
            let mut scratch = ScratchDirs::new(root.path());
            scratch.create("archives").unwrap()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_create_makes_missing_root() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("runner/temp");
        let mut scratch = ScratchDirs::new(&nested);
        let dir = scratch.create("staging").unwrap();
        assert!(dir.starts_with(&nested));
    }
}
