//! Provenance attestation for published packages.
//!
//! An attestation is an in-toto statement about the package manifest digest,
//! signed by an external [`ProvenanceSigner`] into a sigstore bundle and then
//! attached to the package as an OCI 1.1 referrer.

mod binder;
mod signer;
mod statement;

use async_trait::async_trait;
use oci_publish_core::error::Result;
use oci_publish_core::{PublishOptions, Visibility};
use serde::{Deserialize, Serialize};

use crate::oci::Layer;

pub use binder::AttestationBinder;
pub use signer::{CommandSigner, ProvenanceSigner, SigstoreInstance};
pub use statement::{
    build_statement, InTotoStatement, StatementSubject, BUILD_TYPE, IN_TOTO_STATEMENT_TYPE,
    SLSA_PROVENANCE_PREDICATE_TYPE,
};

/// Signed attestation produced by [`Attestor::generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationBundle {
    /// Identifier assigned by an attestation store (absent in compute-only mode)
    #[serde(rename = "attestationID", default, skip_serializing_if = "Option::is_none")]
    pub attestation_id: Option<String>,
    /// Signing certificate (base64 DER), empty when the bundle carries none
    pub certificate: String,
    /// The sigstore bundle JSON
    pub bundle: serde_json::Value,
}

/// Result of attaching an attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachResult {
    /// Digest of the referrer manifest
    pub digest: String,
    /// Where the referrer can be fetched
    pub urls: Vec<String>,
}

/// Identity of the source repository a package was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    /// Subject name ("<registry host>/<repository>")
    pub package_name: String,
    /// Source repository ("owner/name")
    pub repository: String,
    /// Git ref that was released
    pub git_ref: String,
    /// Commit the ref points at
    pub sha: Option<String>,
    /// Source repository visibility
    pub visibility: Visibility,
}

impl RepoIdentity {
    pub fn from_options(options: &PublishOptions) -> Self {
        Self {
            package_name: options.package_name(),
            repository: options.repository.clone(),
            git_ref: options.git_ref.clone(),
            sha: options.sha.clone(),
            visibility: options.visibility,
        }
    }
}

/// Generates and attaches provenance attestations.
#[async_trait]
pub trait Attestor: Send + Sync {
    /// Sign a provenance statement for `subject_digest` without uploading it
    /// anywhere.
    async fn generate(&self, subject_digest: &str, identity: &RepoIdentity)
        -> Result<AttestationBundle>;

    /// Attach a bundle to the manifest described by `subject`.
    async fn attach(
        &self,
        bundle: &AttestationBundle,
        repository: &str,
        subject: &Layer,
    ) -> Result<AttachResult>;
}
