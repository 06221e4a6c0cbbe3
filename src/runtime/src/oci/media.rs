//! Media types used by action packages.

use oci_publish_core::error::{PublishError, Result};

/// OCI image manifest.
pub const IMAGE_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// Action package config blob.
pub const PACKAGE_CONFIG_MEDIA_TYPE: &str = "application/vnd.github.actions.package.config.v1+json";

/// Action package tar.gz layer.
pub const TAR_LAYER_MEDIA_TYPE: &str = "application/vnd.github.actions.package.layer.v1.tar+gzip";

/// Action package zip layer.
pub const ZIP_LAYER_MEDIA_TYPE: &str = "application/vnd.github.actions.package.layer.v1.zip";

/// OCI empty descriptor placeholder.
pub const EMPTY_MEDIA_TYPE: &str = "application/vnd.oci.empty.v1+json";

/// Sigstore bundle, as attached to a package by the attestation referrer.
pub const SIGSTORE_BUNDLE_MEDIA_TYPE: &str = "application/vnd.dev.sigstore.bundle.v0.3+json";

/// Body of the empty config blob.
pub const EMPTY_CONFIG_BODY: &[u8] = b"{}";

/// sha256 of [`EMPTY_CONFIG_BODY`].
pub const EMPTY_CONFIG_DIGEST: &str =
    "sha256:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";

/// Kind of blob an action package layer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Gzipped tarball of the action sources
    Tar,
    /// Zip archive of the action sources
    Zip,
    /// The two-byte `{}` config blob
    EmptyConfig,
}

impl LayerKind {
    /// Media type written into the descriptor.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Tar => TAR_LAYER_MEDIA_TYPE,
            Self::Zip => ZIP_LAYER_MEDIA_TYPE,
            Self::EmptyConfig => PACKAGE_CONFIG_MEDIA_TYPE,
        }
    }

    /// Resolve a descriptor media type. The OCI empty placeholder maps to
    /// [`LayerKind::EmptyConfig`] as well.
    pub fn from_media_type(media_type: &str) -> Result<Self> {
        match media_type {
            TAR_LAYER_MEDIA_TYPE => Ok(Self::Tar),
            ZIP_LAYER_MEDIA_TYPE => Ok(Self::Zip),
            PACKAGE_CONFIG_MEDIA_TYPE | EMPTY_MEDIA_TYPE => Ok(Self::EmptyConfig),
            other => Err(PublishError::UnsupportedMediaType(other.to_string())),
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tar => write!(f, "tar.gz"),
            Self::Zip => write!(f, "zip"),
            Self::EmptyConfig => write!(f, "config"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    #[test]
    fn test_empty_config_digest_matches_body() {
        let digest = format!("sha256:{}", hex::encode(Sha256::digest(EMPTY_CONFIG_BODY)));
        assert_eq!(digest, EMPTY_CONFIG_DIGEST);
    }

    #[test]
    fn test_layer_kind_round_trip() {
        for kind in [LayerKind::Tar, LayerKind::Zip, LayerKind::EmptyConfig] {
            assert_eq!(LayerKind::from_media_type(kind.media_type()).unwrap(), kind);
        }
    }

    #[test]
    fn test_empty_placeholder_is_config() {
        assert_eq!(
            LayerKind::from_media_type(EMPTY_MEDIA_TYPE).unwrap(),
            LayerKind::EmptyConfig
        );
    }

    #[test]
    fn test_unknown_media_type_rejected() {
        let err = LayerKind::from_media_type("application/x-unknown").unwrap_err();
        assert!(matches!(err, PublishError::UnsupportedMediaType(_)));
        assert!(err.to_string().contains("application/x-unknown"));
    }
}
