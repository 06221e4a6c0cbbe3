//! Package archive creation (tar.gz and zip).

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use oci_publish_core::error::{PublishError, Result};

use super::{collect_entries, ArchiveSet, Archiver};
use crate::oci::FileMetadata;

/// File name of the gzipped tarball.
pub const TAR_ARCHIVE_NAME: &str = "action.tar.gz";
/// File name of the zip archive.
pub const ZIP_ARCHIVE_NAME: &str = "action.zip";

/// Writes both archives to the local filesystem.
///
/// Entries are added in sorted order with normalized metadata, so the same
/// staged tree yields the same archive bytes.
#[derive(Debug, Clone, Default)]
pub struct FsArchiver;

impl FsArchiver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Archiver for FsArchiver {
    async fn create_archives(&self, staging_dir: &Path, archive_dir: &Path) -> Result<ArchiveSet> {
        let staging_dir = staging_dir.to_path_buf();
        let archive_dir = archive_dir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let entries = collect_entries(&staging_dir)?;
            let tar = create_tar_gz(&staging_dir, &entries, &archive_dir.join(TAR_ARCHIVE_NAME))?;
            let zip = create_zip(&staging_dir, &entries, &archive_dir.join(ZIP_ARCHIVE_NAME))?;

            tracing::debug!(
                entries = entries.len(),
                tar_size = tar.size,
                zip_size = zip.size,
                "Created package archives"
            );
            Ok(ArchiveSet { zip, tar })
        })
        .await
        .map_err(|e| PublishError::Collaborator(format!("Archive task failed: {}", e)))?
    }
}

/// Create a tar.gz of `entries` (relative to `root`) at `output_path`.
pub fn create_tar_gz(root: &Path, entries: &[PathBuf], output_path: &Path) -> Result<FileMetadata> {
    let file = std::fs::File::create(output_path).map_err(|e| {
        PublishError::Collaborator(format!(
            "Failed to create archive {}: {}",
            output_path.display(),
            e
        ))
    })?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);

    for relative in entries {
        let full_path = root.join(relative);
        if full_path.is_dir() {
            builder.append_dir(relative, &full_path).map_err(|e| {
                PublishError::Collaborator(format!(
                    "Failed to add directory {} to archive: {}",
                    relative.display(),
                    e
                ))
            })?;
        } else {
            builder
                .append_path_with_name(&full_path, relative)
                .map_err(|e| {
                    PublishError::Collaborator(format!(
                        "Failed to add file {} to archive: {}",
                        relative.display(),
                        e
                    ))
                })?;
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| PublishError::Collaborator(format!("Failed to finalize tar archive: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| PublishError::Collaborator(format!("Failed to finalize gzip stream: {}", e)))?;

    FileMetadata::from_path(output_path)
}

/// Create a zip of `entries` (relative to `root`) at `output_path`.
pub fn create_zip(root: &Path, entries: &[PathBuf], output_path: &Path) -> Result<FileMetadata> {
    let file = std::fs::File::create(output_path).map_err(|e| {
        PublishError::Collaborator(format!(
            "Failed to create archive {}: {}",
            output_path.display(),
            e
        ))
    })?;

    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for relative in entries {
        let full_path = root.join(relative);
        let name = zip_entry_name(relative);

        if full_path.is_dir() {
            writer
                .add_directory(format!("{}/", name), options)
                .map_err(|e| {
                    PublishError::Collaborator(format!(
                        "Failed to add directory {} to archive: {}",
                        name, e
                    ))
                })?;
        } else {
            let data = std::fs::read(&full_path).map_err(|e| {
                PublishError::Collaborator(format!(
                    "Failed to read {}: {}",
                    full_path.display(),
                    e
                ))
            })?;
            writer.start_file(name.as_str(), options).map_err(|e| {
                PublishError::Collaborator(format!("Failed to add file {} to archive: {}", name, e))
            })?;
            writer.write_all(&data).map_err(|e| {
                PublishError::Collaborator(format!("Failed to write {} to archive: {}", name, e))
            })?;
        }
    }

    writer
        .finish()
        .map_err(|e| PublishError::Collaborator(format!("Failed to finalize zip archive: {}", e)))?;

    FileMetadata::from_path(output_path)
}

fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
