//! Action package manifest construction.
//!
//! Builds the layer descriptors and OCI image manifest for an action package
//! and computes the manifest's content digest. Serialization is canonical:
//! struct fields are emitted in declaration order and annotation maps are
//! `BTreeMap`s, so structurally equal manifests produce identical bytes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use oci_publish_core::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::media::{
    LayerKind, EMPTY_CONFIG_BODY, EMPTY_CONFIG_DIGEST, IMAGE_MANIFEST_MEDIA_TYPE,
};

/// Annotation holding the creation timestamp.
pub const ANNOTATION_CREATED: &str = "org.opencontainers.image.created";
/// Annotation holding a descriptor's file name.
pub const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";
/// Annotation holding the tar.gz archive digest.
pub const ANNOTATION_TAR_DIGEST: &str = "action.tar.gz.digest";
/// Annotation holding the zip archive digest.
pub const ANNOTATION_ZIP_DIGEST: &str = "action.zip.digest";
/// Annotation marking the package type.
pub const ANNOTATION_PACKAGE_TYPE: &str = "com.github.package.type";

/// Package type marker for action packages.
pub const ACTION_PACKAGE_TYPE: &str = "actions_oci_pkg";

/// A locally produced archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Path to the archive on disk
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Content digest ("sha256:<hex>")
    pub sha256: String,
}

impl FileMetadata {
    /// Describe an existing file, hashing its contents.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            PublishError::Collaborator(format!(
                "Failed to read file for hashing {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            size: data.len() as u64,
            sha256: sha256_digest(&data),
        })
    }

    /// Final path component, used as the layer title.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Descriptor of one blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub media_type: String,
    pub size: u64,
    pub digest: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// OCI image manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub media_type: String,
    pub artifact_type: String,
    pub config: Layer,
    pub layers: Vec<Layer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Layer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Manifest {
    /// Canonical JSON bytes: the exact bytes that are hashed and uploaded.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Serialize once and compute the digest of those bytes.
    pub fn serialize(&self) -> Result<SerializedManifest> {
        let bytes = self.to_canonical_json()?;
        let digest = sha256_digest(&bytes);
        Ok(SerializedManifest { bytes, digest })
    }
}

/// A manifest frozen into its canonical bytes together with their digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedManifest {
    pub bytes: Vec<u8>,
    pub digest: String,
}

impl SerializedManifest {
    /// The manifest as UTF-8 JSON text.
    pub fn json(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Descriptor pointing at this manifest (used as a referrer subject).
    pub fn descriptor(&self) -> Layer {
        Layer {
            media_type: IMAGE_MANIFEST_MEDIA_TYPE.to_string(),
            size: self.bytes.len() as u64,
            digest: self.digest.clone(),
            annotations: BTreeMap::new(),
        }
    }
}

/// Build the descriptor for an archive layer.
pub fn build_layer(kind: LayerKind, file: &FileMetadata) -> Layer {
    let mut annotations = BTreeMap::new();
    annotations.insert(ANNOTATION_TITLE.to_string(), file.file_name());

    Layer {
        media_type: kind.media_type().to_string(),
        size: file.size,
        digest: file.sha256.clone(),
        annotations,
    }
}

/// Fixed descriptor for the `{}` config blob.
pub fn build_empty_config_layer() -> Layer {
    Layer {
        media_type: LayerKind::EmptyConfig.media_type().to_string(),
        size: EMPTY_CONFIG_BODY.len() as u64,
        digest: EMPTY_CONFIG_DIGEST.to_string(),
        annotations: BTreeMap::new(),
    }
}

/// Assemble the manifest for an action package.
///
/// Layers are always config, tar.gz, zip in that order.
pub fn build_action_package_manifest(
    tar_file: &FileMetadata,
    zip_file: &FileMetadata,
    repo_name: &str,
    version: &str,
    created: DateTime<Utc>,
) -> Manifest {
    tracing::debug!(repository = repo_name, version, "Building package manifest");
    let config = build_empty_config_layer();
    let tar_layer = build_layer(LayerKind::Tar, tar_file);
    let zip_layer = build_layer(LayerKind::Zip, zip_file);

    let mut annotations = BTreeMap::new();
    annotations.insert(
        ANNOTATION_CREATED.to_string(),
        created.to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    annotations.insert(ANNOTATION_TAR_DIGEST.to_string(), tar_file.sha256.clone());
    annotations.insert(ANNOTATION_ZIP_DIGEST.to_string(), zip_file.sha256.clone());
    annotations.insert(
        ANNOTATION_PACKAGE_TYPE.to_string(),
        ACTION_PACKAGE_TYPE.to_string(),
    );

    Manifest {
        schema_version: 2,
        media_type: IMAGE_MANIFEST_MEDIA_TYPE.to_string(),
        artifact_type: IMAGE_MANIFEST_MEDIA_TYPE.to_string(),
        config: config.clone(),
        layers: vec![config, tar_layer, zip_layer],
        subject: None,
        annotations,
    }
}

/// Content digest of a manifest's canonical serialization.
pub fn digest_of(manifest: &Manifest) -> Result<String> {
    Ok(manifest.serialize()?.digest)
}

/// "sha256:<hex>" of raw bytes.
pub fn sha256_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn file(name: &str, size: u64, digest: &str) -> FileMetadata {
        FileMetadata {
            path: PathBuf::from("/tmp/archives").join(name),
            size,
            sha256: digest.to_string(),
        }
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    fn sample_manifest() -> Manifest {
        build_action_package_manifest(
            &file("action.tar.gz", 1234, "sha256:tar"),
            &file("action.zip", 5678, "sha256:zip"),
            "octo-org/hello-action",
            "1.2.3",
            created(),
        )
    }

    #[test]
    fn test_build_layer_uses_file_metadata() {
        let layer = build_layer(LayerKind::Tar, &file("action.tar.gz", 42, "sha256:abc"));
        assert_eq!(layer.media_type, LayerKind::Tar.media_type());
        assert_eq!(layer.size, 42);
        assert_eq!(layer.digest, "sha256:abc");
        assert_eq!(layer.annotations[ANNOTATION_TITLE], "action.tar.gz");
    }

    #[test]
    fn test_empty_config_layer_is_constant() {
        let a = build_empty_config_layer();
        let b = build_empty_config_layer();
        assert_eq!(a, b);
        assert_eq!(a.size, 2);
        assert_eq!(a.digest, sha256_digest(b"{}"));
        assert!(a.annotations.is_empty());
    }

    #[test]
    fn test_manifest_layer_order() {
        let manifest = sample_manifest();
        assert_eq!(manifest.schema_version, 2);
        assert_eq!(manifest.media_type, IMAGE_MANIFEST_MEDIA_TYPE);
        assert_eq!(manifest.artifact_type, IMAGE_MANIFEST_MEDIA_TYPE);
        assert_eq!(manifest.config, build_empty_config_layer());

        let kinds: Vec<LayerKind> = manifest
            .layers
            .iter()
            .map(|l| LayerKind::from_media_type(&l.media_type).unwrap())
            .collect();
        assert_eq!(
            kinds,
            vec![LayerKind::EmptyConfig, LayerKind::Tar, LayerKind::Zip]
        );
    }

    #[test]
    fn test_manifest_annotations() {
        let manifest = sample_manifest();
        assert_eq!(
            manifest.annotations[ANNOTATION_CREATED],
            "2024-03-01T12:30:00.000Z"
        );
        assert_eq!(manifest.annotations[ANNOTATION_TAR_DIGEST], "sha256:tar");
        assert_eq!(manifest.annotations[ANNOTATION_ZIP_DIGEST], "sha256:zip");
        assert_eq!(manifest.annotations[ANNOTATION_PACKAGE_TYPE], "actions_oci_pkg");
        assert_eq!(manifest.annotations.len(), 4);
    }

    #[test]
    fn test_digest_is_deterministic() {
        let first = digest_of(&sample_manifest()).unwrap();
        let second = digest_of(&sample_manifest()).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("sha256:"));
        assert_eq!(first.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_digest_changes_with_content() {
        let a = sample_manifest();
        let mut b = sample_manifest();
        b.annotations
            .insert(ANNOTATION_TAR_DIGEST.to_string(), "sha256:other".to_string());
        assert_ne!(digest_of(&a).unwrap(), digest_of(&b).unwrap());
    }

    #[test]
    fn test_digest_matches_serialized_bytes() {
        let manifest = sample_manifest();
        let serialized = manifest.serialize().unwrap();
        assert_eq!(serialized.digest, sha256_digest(&serialized.bytes));
        assert_eq!(serialized.digest, digest_of(&manifest).unwrap());
    }

    #[test]
    fn test_canonical_json_field_order() {
        let json = sample_manifest().serialize().unwrap().json();
        let schema = json.find("\"schemaVersion\"").unwrap();
        let media = json.find("\"mediaType\"").unwrap();
        let config = json.find("\"config\"").unwrap();
        let layers = json.find("\"layers\"").unwrap();
        assert!(schema < media && media < config && config < layers);
        assert!(!json.contains("\"subject\""));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_manifest_json_round_trip_keeps_digest() {
        let manifest = sample_manifest();
        let serialized = manifest.serialize().unwrap();
        let parsed: Manifest = serde_json::from_slice(&serialized.bytes).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(digest_of(&parsed).unwrap(), serialized.digest);
    }

    #[test]
    fn test_descriptor_of_serialized_manifest() {
        let serialized = sample_manifest().serialize().unwrap();
        let desc = serialized.descriptor();
        assert_eq!(desc.media_type, IMAGE_MANIFEST_MEDIA_TYPE);
        assert_eq!(desc.size, serialized.bytes.len() as u64);
        assert_eq!(desc.digest, serialized.digest);
    }

    #[test]
    fn test_file_metadata_from_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("action.zip");
        std::fs::write(&path, b"zip bytes").unwrap();

        let meta = FileMetadata::from_path(&path).unwrap();
        assert_eq!(meta.size, 9);
        assert_eq!(meta.sha256, sha256_digest(b"zip bytes"));
        assert_eq!(meta.file_name(), "action.zip");
    }

    #[test]
    fn test_file_metadata_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = FileMetadata::from_path(&tmp.path().join("missing.zip")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file for hashing"));
    }
}
