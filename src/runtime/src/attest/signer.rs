//! Provenance signing through an external command.

use std::process::Stdio;

use async_trait::async_trait;
use oci_publish_core::error::{PublishError, Result};
use oci_publish_core::Visibility;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::InTotoStatement;

/// Sigstore instance a statement is signed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigstoreInstance {
    /// The public-good instance (public repositories)
    PublicGood,
    /// The GitHub instance (private and internal repositories)
    Github,
}

impl SigstoreInstance {
    pub fn for_visibility(visibility: Visibility) -> Self {
        match visibility {
            Visibility::Public => Self::PublicGood,
            Visibility::Private | Visibility::Internal => Self::Github,
        }
    }
}

impl std::fmt::Display for SigstoreInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PublicGood => write!(f, "public-good"),
            Self::Github => write!(f, "github"),
        }
    }
}

/// Signs in-toto statements into sigstore bundles.
///
/// Signing is compute-only: implementations must not upload the statement
/// or the bundle to a transparency log.
#[async_trait]
pub trait ProvenanceSigner: Send + Sync {
    async fn sign(
        &self,
        statement: &InTotoStatement,
        instance: SigstoreInstance,
    ) -> Result<serde_json::Value>;
}

/// Runs a signing command.
///
/// The statement JSON is written to the command's stdin and the sigstore
/// bundle JSON is read from its stdout. The command is invoked with
/// `--no-tlog-upload --instance <instance>` appended to its arguments.
#[derive(Debug, Clone)]
pub struct CommandSigner {
    program: String,
    args: Vec<String>,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace separated command line.
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(|s| s.to_string());
        let program = parts
            .next()
            .ok_or_else(|| PublishError::Config("Signer command is empty".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl ProvenanceSigner for CommandSigner {
    async fn sign(
        &self,
        statement: &InTotoStatement,
        instance: SigstoreInstance,
    ) -> Result<serde_json::Value> {
        let payload = statement.to_json()?;

        tracing::debug!(signer = %self.program, %instance, "Signing provenance statement");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--no-tlog-upload")
            .arg("--instance")
            .arg(instance.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PublishError::Attestation(format!(
                    "Failed to start signer {}: {}",
                    self.program, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(payload.as_bytes()).await.map_err(|e| {
                PublishError::Attestation(format!("Failed to send statement to signer: {}", e))
            })?;
        }

        let output = child.wait_with_output().await.map_err(|e| {
            PublishError::Attestation(format!("Failed to wait for signer: {}", e))
        })?;

        if !output.status.success() {
            return Err(PublishError::Attestation(format!(
                "Signer {} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            PublishError::Attestation(format!("Signer returned an invalid bundle: {}", e))
        })
    }
}
