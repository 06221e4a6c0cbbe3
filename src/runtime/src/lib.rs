//! oci-publish Runtime - action package publishing.
//!
//! This crate provides the publishing pipeline for action packages:
//! manifest construction, the OCI registry upload protocol, provenance
//! attestation, the source tree collaborators and the publish state machine.

#![allow(clippy::result_large_err)]

pub mod attest;
pub mod oci;
pub mod outputs;
pub mod publish;
pub mod source;
pub mod testing;

use std::sync::Arc;

use chrono::{DateTime, Utc};

// Re-export common types
pub use attest::{AttachResult, AttestationBinder, AttestationBundle, Attestor, CommandSigner};
pub use attest::{ProvenanceSigner, RepoIdentity, SigstoreInstance};
pub use oci::{digest_of, FileMetadata, Layer, LayerKind, Manifest, SerializedManifest};
pub use oci::{PublishResult, RegistryClient, RegistryTransport, ReqwestTransport};
pub use outputs::{GithubOutputs, MemoryOutputs, OutputSink};
pub use publish::{parse_release_tag, PublishOutcome, Publisher, ReleaseTag, Stage};
pub use source::{ArchiveSet, Archiver, CheckoutVerifier, FsArchiver, FsStager, GitCheckout, Stager};

/// oci-publish Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source of "now" for manifest timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clock reading the system time.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}
