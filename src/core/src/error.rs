use serde::{Deserialize, Serialize};
use thiserror::Error;

/// oci-publish error types
#[derive(Error, Debug)]
pub enum PublishError {
    /// Release ref or tag rejected before any work started
    #[error("{0}")]
    Validation(String),

    /// Checkout, staging or archiving collaborator failed (message kept verbatim)
    #[error("{0}")]
    Collaborator(String),

    /// Blob existence check returned an unexpected status
    #[error("Unexpected {status} response from check blob {digest}. Response body: {body}")]
    BlobCheck {
        digest: String,
        status: u16,
        body: String,
    },

    /// Upload session could not be started
    #[error("Unexpected {status} response from initiate layer upload for {digest}. Response body: {body}")]
    UploadInitiation {
        digest: String,
        status: u16,
        body: String,
    },

    /// Upload session started without a location to upload to
    #[error("No location header in response from initiate layer upload for {digest}")]
    MissingLocationHeader { digest: String },

    /// Blob PUT was not accepted
    #[error("Unexpected {status} response from layer upload for {digest}. Response body: {body}")]
    BlobUpload {
        digest: String,
        status: u16,
        body: String,
    },

    /// Manifest PUT was not accepted
    #[error("Unexpected {status} response from manifest upload. {}", render_details(.details, .body))]
    ManifestUpload {
        status: u16,
        details: Vec<RegistryErrorDetail>,
        body: String,
    },

    /// Registry-confirmed manifest digest differs from the locally computed one
    #[error("Digest mismatch. Expected {expected}, got {actual}.")]
    DigestMismatch { expected: String, actual: String },

    /// Attestation generation or attachment failed (message kept verbatim)
    #[error("{0}")]
    Attestation(String),

    /// Layer media type the publisher does not know how to upload
    #[error("Unsupported layer media type: {0}")]
    UnsupportedMediaType(String),

    /// Configuration or input error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request could not be completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        PublishError::SerializationError(err.to_string())
    }
}

/// One entry of an OCI distribution error body (`{"errors": [...]}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryErrorDetail {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
struct RegistryErrorBody {
    errors: Vec<RegistryErrorDetail>,
}

impl RegistryErrorDetail {
    /// Parse the structured errors out of a registry response body.
    ///
    /// Returns an empty list when the body is not an OCI error document.
    pub fn parse_body(body: &str) -> Vec<RegistryErrorDetail> {
        serde_json::from_str::<RegistryErrorBody>(body)
            .map(|b| b.errors)
            .unwrap_or_default()
    }
}

fn render_details(details: &[RegistryErrorDetail], body: &str) -> String {
    if details.is_empty() {
        return format!("Response body: {}", body);
    }
    let rendered: Vec<String> = details
        .iter()
        .map(|d| format!("{} - {}", d.code, d.message))
        .collect();
    format!("Errors: {}", rendered.join(", "))
}

/// Result type alias for oci-publish operations
pub type Result<T> = std::result::Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_is_verbatim() {
        let error = PublishError::Validation("The ref refs/heads/main is not a valid tag reference.".to_string());
        assert_eq!(
            error.to_string(),
            "The ref refs/heads/main is not a valid tag reference."
        );
    }

    #[test]
    fn test_collaborator_error_is_verbatim() {
        let error = PublishError::Collaborator("staging failed: disk full".to_string());
        assert_eq!(error.to_string(), "staging failed: disk full");
    }

    #[test]
    fn test_blob_check_error_display() {
        let error = PublishError::BlobCheck {
            digest: "sha256:abc".to_string(),
            status: 500,
            body: "boom".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("500"));
        assert!(msg.contains("sha256:abc"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_missing_location_display() {
        let error = PublishError::MissingLocationHeader {
            digest: "sha256:abc".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "No location header in response from initiate layer upload for sha256:abc"
        );
    }

    #[test]
    fn test_manifest_upload_with_details() {
        let body = r#"{"errors":[{"code":"MANIFEST_INVALID","message":"manifest invalid"},{"code":"DENIED","message":"no"}]}"#;
        let error = PublishError::ManifestUpload {
            status: 400,
            details: RegistryErrorDetail::parse_body(body),
            body: body.to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unexpected 400 response from manifest upload. Errors: MANIFEST_INVALID - manifest invalid, DENIED - no"
        );
    }

    #[test]
    fn test_manifest_upload_with_raw_body() {
        let error = PublishError::ManifestUpload {
            status: 502,
            details: RegistryErrorDetail::parse_body("bad gateway"),
            body: "bad gateway".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unexpected 502 response from manifest upload. Response body: bad gateway"
        );
    }

    #[test]
    fn test_digest_mismatch_names_both_digests() {
        let error = PublishError::DigestMismatch {
            expected: "sha256:aaa".to_string(),
            actual: "sha256:bbb".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Digest mismatch. Expected sha256:aaa, got sha256:bbb."
        );
    }

    #[test]
    fn test_parse_body_without_errors() {
        assert!(RegistryErrorDetail::parse_body("{}").is_empty());
        assert!(RegistryErrorDetail::parse_body("").is_empty());
    }

    #[test]
    fn test_parse_body_missing_message() {
        let details = RegistryErrorDetail::parse_body(r#"{"errors":[{"code":"UNAUTHORIZED"}]}"#);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].code, "UNAUTHORIZED");
        assert_eq!(details[0].message, "");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PublishError = io_error.into();
        assert!(matches!(err, PublishError::IoError(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ invalid json }");
        let err: PublishError = result.unwrap_err().into();
        assert!(matches!(err, PublishError::SerializationError(_)));
    }
}
