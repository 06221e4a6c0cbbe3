//! OCI artifact support for action packages.
//!
//! This module builds action package manifests and pushes them, together
//! with their blobs, to an OCI distribution registry.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Action Package Manifest                  │
//! │                                                              │
//! │  config   ── {} (empty config, package config media type)    │
//! │  layers   ── [config, action.tar.gz, action.zip]             │
//! │  annotations                                                 │
//! │    org.opencontainers.image.created                          │
//! │    action.tar.gz.digest / action.zip.digest                  │
//! │    com.github.package.type = actions_oci_pkg                 │
//! └──────────────────────────────────────────────────────────────┘
//!            │ canonical JSON ── sha256 ──► published digest
//!            ▼
//!   HEAD blob ─► POST upload ─► PUT blob   (per layer, concurrent)
//!            ▼
//!   PUT manifest ─► verify docker-content-digest
//! ```

pub mod manifest;
pub mod media;
pub mod registry;
pub mod transport;

pub use manifest::{
    build_action_package_manifest, build_empty_config_layer, build_layer, digest_of,
    sha256_digest, FileMetadata, Layer, Manifest, SerializedManifest,
};
pub use media::{
    LayerKind, EMPTY_CONFIG_BODY, EMPTY_CONFIG_DIGEST, EMPTY_MEDIA_TYPE,
    IMAGE_MANIFEST_MEDIA_TYPE, PACKAGE_CONFIG_MEDIA_TYPE, SIGSTORE_BUNDLE_MEDIA_TYPE,
    TAR_LAYER_MEDIA_TYPE, ZIP_LAYER_MEDIA_TYPE,
};
pub use registry::{plan_uploads, BlobOutcome, BlobSource, PublishResult, RegistryClient};
pub use transport::{HttpRequest, HttpResponse, Method, RegistryTransport, ReqwestTransport};
