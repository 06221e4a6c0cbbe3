//! Git checkout verification.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use oci_publish_core::error::{PublishError, Result};
use tokio::process::Command;

use super::CheckoutVerifier;

/// Verifies the workspace HEAD is the commit the tag points at.
#[derive(Debug, Clone)]
pub struct GitCheckout {
    git: String,
}

impl GitCheckout {
    pub fn new() -> Self {
        Self {
            git: "git".to_string(),
        }
    }

    /// Use a specific git executable.
    pub fn with_program(git: impl Into<String>) -> Self {
        Self { git: git.into() }
    }

    async fn rev_parse(&self, workspace: &Path, rev: &str) -> Result<String> {
        let output = Command::new(&self.git)
            .arg("rev-parse")
            .arg(rev)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                PublishError::Collaborator(format!("Failed to run {}: {}", self.git, e))
            })?;

        if !output.status.success() {
            return Err(PublishError::Collaborator(format!(
                "git rev-parse {} failed: {}",
                rev,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Default for GitCheckout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckoutVerifier for GitCheckout {
    async fn ensure_checked_out(&self, workspace: &Path, tag: &str) -> Result<()> {
        let head = self.rev_parse(workspace, "HEAD").await?;
        let tagged = self
            .rev_parse(workspace, &format!("refs/tags/{}^{{commit}}", tag))
            .await?;

        if head != tagged {
            return Err(PublishError::Collaborator(format!(
                "The checked out commit {} does not match tag {} ({}). \
                 Check out the tag before publishing.",
                head, tag, tagged
            )));
        }

        tracing::debug!(tag, commit = %head, "Checkout matches tag");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_git_binary_is_collaborator_error() {
        let tmp = TempDir::new().unwrap();
        let checkout = GitCheckout::with_program("definitely-not-a-real-git-binary");
        let err = checkout
            .ensure_checked_out(tmp.path(), "v1.0.0")
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Collaborator(_)));
        assert!(err.to_string().contains("Failed to run"));
    }
}
