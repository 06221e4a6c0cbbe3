//! Publish state machine.
//!
//! ```text
//! ValidateRef ─► EnsureCheckedOut ─► Stage ─► Archive ─► BuildManifest
//!      ─► Publish ─► [Attest ─► AttachAttestation] ─► EmitOutputs
//!                                                        │
//!                        Cleanup (always) ◄──────────────┘
//! ```
//!
//! The first failing stage ends the run. Scratch directories are removed
//! whatever the outcome, and outputs are only written once every other
//! stage has succeeded.

mod scratch;
mod tag;

use std::sync::Arc;

use oci_publish_core::error::{PublishError, Result};
use oci_publish_core::PublishOptions;

use crate::attest::{AttachResult, Attestor, RepoIdentity};
use crate::oci::{build_action_package_manifest, RegistryClient};
use crate::outputs::{
    OutputSink, OUTPUT_ATTESTATION_MANIFEST_SHA, OUTPUT_ATTESTATION_URL, OUTPUT_PACKAGE_MANIFEST,
    OUTPUT_PACKAGE_MANIFEST_SHA, OUTPUT_PACKAGE_URL,
};
use crate::source::{Archiver, CheckoutVerifier, FsArchiver, FsStager, GitCheckout, Stager};
use crate::{system_clock, Clock};

pub use scratch::ScratchDirs;
pub use tag::{parse_release_tag, ReleaseTag};

/// Stages of a publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidateRef,
    EnsureCheckedOut,
    StageSources,
    Archive,
    BuildManifest,
    Publish,
    Attest,
    AttachAttestation,
    EmitOutputs,
    Cleanup,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ValidateRef => "validate-ref",
            Self::EnsureCheckedOut => "ensure-checked-out",
            Self::StageSources => "stage",
            Self::Archive => "archive",
            Self::BuildManifest => "build-manifest",
            Self::Publish => "publish",
            Self::Attest => "attest",
            Self::AttachAttestation => "attach-attestation",
            Self::EmitOutputs => "emit-outputs",
            Self::Cleanup => "cleanup",
        };
        write!(f, "{}", name)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Published version (manifest reference)
    pub version: String,
    pub package_url: String,
    pub manifest_digest: String,
    pub manifest_json: String,
    /// Present unless running in enterprise mode
    pub attestation: Option<AttachResult>,
    /// Outputs written, in order
    pub outputs: Vec<(String, String)>,
}

/// Runs the publish pipeline for one release.
pub struct Publisher {
    options: PublishOptions,
    registry: RegistryClient,
    checkout: Arc<dyn CheckoutVerifier>,
    stager: Arc<dyn Stager>,
    archiver: Arc<dyn Archiver>,
    attestor: Option<Arc<dyn Attestor>>,
    outputs: Arc<dyn OutputSink>,
    clock: Clock,
}

impl Publisher {
    /// Create a publisher with the filesystem and git collaborators.
    pub fn new(
        options: PublishOptions,
        registry: RegistryClient,
        outputs: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            options,
            registry,
            checkout: Arc::new(GitCheckout::new()),
            stager: Arc::new(FsStager::new()),
            archiver: Arc::new(FsArchiver::new()),
            attestor: None,
            outputs,
            clock: system_clock(),
        }
    }

    pub fn with_checkout(mut self, checkout: Arc<dyn CheckoutVerifier>) -> Self {
        self.checkout = checkout;
        self
    }

    pub fn with_stager(mut self, stager: Arc<dyn Stager>) -> Self {
        self.stager = stager;
        self
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    /// Attestor used outside enterprise mode.
    pub fn with_attestor(mut self, attestor: Arc<dyn Attestor>) -> Self {
        self.attestor = Some(attestor);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Run every stage, then clean up.
    pub async fn run(&self) -> Result<PublishOutcome> {
        let mut scratch = ScratchDirs::new(&self.options.temp_root);
        let result = self.run_stages(&mut scratch).await;

        tracing::debug!(stage = %Stage::Cleanup, "Entering stage");
        scratch.cleanup();

        match &result {
            Ok(outcome) => tracing::info!(
                package_url = %outcome.package_url,
                digest = %outcome.manifest_digest,
                "Publish complete"
            ),
            Err(e) => tracing::debug!(error = %e, "Publish failed"),
        }
        result
    }

    async fn run_stages(&self, scratch: &mut ScratchDirs) -> Result<PublishOutcome> {
        enter(Stage::ValidateRef);
        let release = parse_release_tag(&self.options.git_ref)?;
        let version = release.version_string();
        let attestor = self.attestor_for_run()?;

        enter(Stage::EnsureCheckedOut);
        self.checkout
            .ensure_checked_out(&self.options.workspace_dir, &release.tag)
            .await?;

        enter(Stage::StageSources);
        let staging_dir = scratch.create("staging")?;
        self.stager
            .stage(&self.options.workspace_dir, &staging_dir)
            .await?;

        enter(Stage::Archive);
        let archive_dir = scratch.create("archives")?;
        let archives = self
            .archiver
            .create_archives(&staging_dir, &archive_dir)
            .await?;

        enter(Stage::BuildManifest);
        let manifest = build_action_package_manifest(
            &archives.tar,
            &archives.zip,
            &self.options.repository,
            &version,
            (self.clock)(),
        );

        enter(Stage::Publish);
        let published = self
            .registry
            .publish(&version, &[archives.tar, archives.zip], &manifest)
            .await?;

        let attestation = match attestor {
            Some(attestor) => {
                enter(Stage::Attest);
                let identity = RepoIdentity::from_options(&self.options);
                let bundle = attestor
                    .generate(&published.published_digest, &identity)
                    .await?;

                enter(Stage::AttachAttestation);
                let attached = attestor
                    .attach(
                        &bundle,
                        &self.options.repository,
                        &published.manifest.descriptor(),
                    )
                    .await?;
                Some(attached)
            }
            None => {
                tracing::info!("Enterprise server detected, skipping attestation");
                None
            }
        };

        enter(Stage::EmitOutputs);
        let mut outputs = vec![
            (OUTPUT_PACKAGE_URL.to_string(), published.package_url.clone()),
            (OUTPUT_PACKAGE_MANIFEST.to_string(), published.manifest.json()),
            (
                OUTPUT_PACKAGE_MANIFEST_SHA.to_string(),
                published.published_digest.clone(),
            ),
        ];
        if let Some(attached) = &attestation {
            outputs.push((
                OUTPUT_ATTESTATION_MANIFEST_SHA.to_string(),
                attached.digest.clone(),
            ));
            outputs.push((
                OUTPUT_ATTESTATION_URL.to_string(),
                attached.urls.first().cloned().unwrap_or_default(),
            ));
        }
        self.outputs.set_outputs(&outputs)?;

        Ok(PublishOutcome {
            version,
            package_url: published.package_url,
            manifest_digest: published.published_digest,
            manifest_json: published.manifest.json(),
            attestation,
            outputs,
        })
    }

    /// The attestor this run will use, or `None` in enterprise mode.
    fn attestor_for_run(&self) -> Result<Option<Arc<dyn Attestor>>> {
        if self.options.enterprise {
            return Ok(None);
        }
        self.attestor.clone().map(Some).ok_or_else(|| {
            PublishError::Config("Attestation is required but no attestor is configured".to_string())
        })
    }
}

fn enter(stage: Stage) {
    tracing::info!(stage = %stage, "Entering stage");
}
