//! Attestation generation and OCI referrer attachment.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::SecondsFormat;
use oci_publish_core::error::{PublishError, Result};

use super::signer::{ProvenanceSigner, SigstoreInstance};
use super::statement::{build_statement, SLSA_PROVENANCE_PREDICATE_TYPE};
use super::{AttachResult, AttestationBundle, Attestor, RepoIdentity};
use crate::oci::manifest::ANNOTATION_CREATED;
use crate::oci::{
    sha256_digest, BlobSource, Layer, Manifest, RegistryClient, EMPTY_CONFIG_BODY,
    EMPTY_CONFIG_DIGEST, EMPTY_MEDIA_TYPE, IMAGE_MANIFEST_MEDIA_TYPE, SIGSTORE_BUNDLE_MEDIA_TYPE,
};
use crate::{system_clock, Clock};

/// Annotation naming the bundle content kind.
pub const ANNOTATION_BUNDLE_CONTENT: &str = "dev.sigstore.bundle.content";
/// Annotation naming the attested predicate type.
pub const ANNOTATION_BUNDLE_PREDICATE_TYPE: &str = "dev.sigstore.bundle.predicateType";

/// Default [`Attestor`]: signs with a [`ProvenanceSigner`] and pushes the
/// bundle as a referrer of the package manifest.
pub struct AttestationBinder {
    signer: Arc<dyn ProvenanceSigner>,
    registry: RegistryClient,
    clock: Clock,
}

impl AttestationBinder {
    pub fn new(signer: Arc<dyn ProvenanceSigner>, registry: RegistryClient) -> Self {
        Self {
            signer,
            registry,
            clock: system_clock(),
        }
    }

    /// Use a fixed clock for the referrer's creation annotation.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Build the referrer manifest for a bundle.
    pub fn referrer_manifest(&self, bundle_bytes: &[u8], subject: &Layer) -> Manifest {
        let mut annotations = BTreeMap::new();
        annotations.insert(
            ANNOTATION_BUNDLE_CONTENT.to_string(),
            "dsse-envelope".to_string(),
        );
        annotations.insert(
            ANNOTATION_BUNDLE_PREDICATE_TYPE.to_string(),
            SLSA_PROVENANCE_PREDICATE_TYPE.to_string(),
        );
        annotations.insert(
            ANNOTATION_CREATED.to_string(),
            (self.clock)().to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        Manifest {
            schema_version: 2,
            media_type: IMAGE_MANIFEST_MEDIA_TYPE.to_string(),
            artifact_type: SIGSTORE_BUNDLE_MEDIA_TYPE.to_string(),
            config: empty_descriptor(),
            layers: vec![Layer {
                media_type: SIGSTORE_BUNDLE_MEDIA_TYPE.to_string(),
                size: bundle_bytes.len() as u64,
                digest: sha256_digest(bundle_bytes),
                annotations: BTreeMap::new(),
            }],
            subject: Some(subject.clone()),
            annotations,
        }
    }
}

#[async_trait]
impl Attestor for AttestationBinder {
    async fn generate(
        &self,
        subject_digest: &str,
        identity: &RepoIdentity,
    ) -> Result<AttestationBundle> {
        let statement = build_statement(subject_digest, identity)?;
        let instance = SigstoreInstance::for_visibility(identity.visibility);

        let bundle = self
            .signer
            .sign(&statement, instance)
            .await
            .map_err(|e| attestation_error("Failed to sign provenance statement", e))?;

        tracing::info!(
            subject = %identity.package_name,
            digest = subject_digest,
            %instance,
            "Generated provenance attestation"
        );

        Ok(AttestationBundle {
            attestation_id: None,
            certificate: signing_certificate(&bundle).unwrap_or_default(),
            bundle,
        })
    }

    async fn attach(
        &self,
        bundle: &AttestationBundle,
        repository: &str,
        subject: &Layer,
    ) -> Result<AttachResult> {
        let client = self.registry.for_repository(repository);
        let bundle_bytes = serde_json::to_vec(&bundle.bundle)?;
        let manifest = self.referrer_manifest(&bundle_bytes, subject);
        let serialized = manifest.serialize()?;

        let uploads = vec![
            (manifest.config.clone(), BlobSource::Empty),
            (manifest.layers[0].clone(), BlobSource::Bytes(bundle_bytes)),
        ];
        client
            .upload_layers(uploads)
            .await
            .map_err(|e| attestation_error("Failed to upload attestation blobs", e))?;

        let confirmed = client
            .upload_manifest(&serialized.digest, &manifest.media_type, &serialized)
            .await
            .map_err(|e| attestation_error("Failed to upload attestation manifest", e))?;
        let digest = confirmed.unwrap_or_else(|| serialized.digest.clone());

        tracing::info!(
            repository,
            subject = %subject.digest,
            digest = %digest,
            "Attached attestation"
        );

        Ok(AttachResult {
            urls: vec![client.digest_url(&digest)],
            digest,
        })
    }
}

/// Descriptor of the OCI empty blob.
fn empty_descriptor() -> Layer {
    Layer {
        media_type: EMPTY_MEDIA_TYPE.to_string(),
        size: EMPTY_CONFIG_BODY.len() as u64,
        digest: EMPTY_CONFIG_DIGEST.to_string(),
        annotations: BTreeMap::new(),
    }
}

/// Signing certificate from a sigstore bundle's verification material.
fn signing_certificate(bundle: &serde_json::Value) -> Option<String> {
    let material = bundle.get("verificationMaterial")?;
    material
        .pointer("/certificate/rawBytes")
        .or_else(|| material.pointer("/x509CertificateChain/certificates/0/rawBytes"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Log `context` and surface the underlying message unchanged.
fn attestation_error(context: &str, error: PublishError) -> PublishError {
    tracing::warn!(error = %error, "{}", context);
    match error {
        PublishError::Attestation(message) => PublishError::Attestation(message),
        other => PublishError::Attestation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attest::InTotoStatement;
    use crate::oci::transport::Method;
    use crate::testing::FakeRegistry;
    use chrono::{TimeZone, Utc};
    use oci_publish_core::Visibility;
    use parking_lot::Mutex;

    const BASE: &str = "https://ghcr.io";

    struct RecordingSigner {
        seen: Mutex<Vec<(InTotoStatement, SigstoreInstance)>>,
        fail: bool,
    }

    impl RecordingSigner {
        fn new(fail: bool) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl ProvenanceSigner for RecordingSigner {
        async fn sign(
            &self,
            statement: &InTotoStatement,
            instance: SigstoreInstance,
        ) -> Result<serde_json::Value> {
            self.seen.lock().push((statement.clone(), instance));
            if self.fail {
                return Err(PublishError::Transport("signing service unavailable".to_string()));
            }
            Ok(serde_json::json!({
                "mediaType": SIGSTORE_BUNDLE_MEDIA_TYPE,
                "verificationMaterial": { "certificate": { "rawBytes": "Y2VydA==" } },
                "dsseEnvelope": { "payload": "e30=", "payloadType": "application/vnd.in-toto+json" }
            }))
        }
    }

    fn identity(visibility: Visibility) -> RepoIdentity {
        RepoIdentity {
            package_name: "ghcr.io/octo-org/hello-action".to_string(),
            repository: "octo-org/hello-action".to_string(),
            git_ref: "refs/tags/v1.0.0".to_string(),
            sha: Some("abc".to_string()),
            visibility,
        }
    }

    fn binder(fake: &Arc<FakeRegistry>, signer: Arc<RecordingSigner>) -> AttestationBinder {
        let client = RegistryClient::new(fake.clone(), BASE, "octo-org/hello-action", "token");
        AttestationBinder::new(signer, client)
            .with_clock(Arc::new(|| Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()))
    }

    fn subject() -> Layer {
        Layer {
            media_type: IMAGE_MANIFEST_MEDIA_TYPE.to_string(),
            size: 512,
            digest: "sha256:feed".to_string(),
            annotations: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_generate_signs_statement_for_digest() {
        let fake = Arc::new(FakeRegistry::new(BASE));
        let signer = Arc::new(RecordingSigner::new(false));
        let bundle = binder(&fake, signer.clone())
            .generate("sha256:feed", &identity(Visibility::Private))
            .await
            .unwrap();

        assert_eq!(bundle.certificate, "Y2VydA==");
        assert!(bundle.attestation_id.is_none());
        let seen = signer.seen.lock();
        assert_eq!(seen[0].0.subject[0].digest["sha256"], "feed");
        assert_eq!(seen[0].1, SigstoreInstance::Github);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_generate_keeps_signer_message() {
        let fake = Arc::new(FakeRegistry::new(BASE));
        let err = binder(&fake, Arc::new(RecordingSigner::new(true)))
            .generate("sha256:feed", &identity(Visibility::Public))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Attestation(_)));
        assert_eq!(
            err.to_string(),
            "Transport error: signing service unavailable"
        );
    }

    #[tokio::test]
    async fn test_attach_pushes_referrer_by_digest() {
        let fake = Arc::new(FakeRegistry::new(BASE));
        let b = binder(&fake, Arc::new(RecordingSigner::new(false)));
        let bundle = b
            .generate("sha256:feed", &identity(Visibility::Public))
            .await
            .unwrap();

        let result = b
            .attach(&bundle, "octo-org/hello-action", &subject())
            .await
            .unwrap();

        assert!(result.digest.starts_with("sha256:"));
        assert_eq!(
            result.urls,
            vec![format!("https://ghcr.io/octo-org/hello-action@{}", result.digest)]
        );

        let stored = fake.manifest(&result.digest).unwrap();
        let manifest: Manifest = serde_json::from_slice(&stored).unwrap();
        assert_eq!(manifest.artifact_type, SIGSTORE_BUNDLE_MEDIA_TYPE);
        assert_eq!(manifest.config.media_type, EMPTY_MEDIA_TYPE);
        assert_eq!(manifest.subject, Some(subject()));
        assert_eq!(manifest.layers.len(), 1);
        assert!(fake.has_blob(&manifest.layers[0].digest));
        assert!(fake.has_blob(EMPTY_CONFIG_DIGEST));
        assert_eq!(fake.count(Method::Head), 2);
        assert_eq!(fake.manifest_puts(), 1);
    }

    #[tokio::test]
    async fn test_attach_falls_back_to_local_digest() {
        let fake = Arc::new(FakeRegistry::new(BASE));
        fake.omit_digest_header();
        let b = binder(&fake, Arc::new(RecordingSigner::new(false)));
        let bundle = b
            .generate("sha256:feed", &identity(Visibility::Public))
            .await
            .unwrap();

        let result = b.attach(&bundle, "octo-org/hello-action", &subject()).await.unwrap();
        let bytes = serde_json::to_vec(&bundle.bundle).unwrap();
        let expected = b.referrer_manifest(&bytes, &subject()).serialize().unwrap().digest;
        assert_eq!(result.digest, expected);
    }

    #[tokio::test]
    async fn test_attach_failure_is_attestation_error() {
        let fake = Arc::new(FakeRegistry::new(BASE));
        fake.set_manifest_response(403, "denied");
        let b = binder(&fake, Arc::new(RecordingSigner::new(false)));
        let bundle = b
            .generate("sha256:feed", &identity(Visibility::Public))
            .await
            .unwrap();

        let err = b
            .attach(&bundle, "octo-org/hello-action", &subject())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Attestation(_)));
        assert!(err.to_string().contains("403"));
        assert!(!err.to_string().starts_with("Failed to upload"));
    }

    #[test]
    fn test_signing_certificate_from_chain() {
        let bundle = serde_json::json!({
            "verificationMaterial": {
                "x509CertificateChain": { "certificates": [{ "rawBytes": "Zmlyc3Q=" }] }
            }
        });
        assert_eq!(signing_certificate(&bundle).as_deref(), Some("Zmlyc3Q="));
        assert_eq!(signing_certificate(&serde_json::json!({})), None);
    }
}
