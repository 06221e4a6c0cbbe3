//! Step outputs.
//!
//! Outputs are written in the GitHub Actions `$GITHUB_OUTPUT` format:
//!
//! ```text
//! package-url<<ghadelimiter_3f6c...
//! https://ghcr.io/octo-org/hello-action:1.2.3
//! ghadelimiter_3f6c...
//! ```

use std::io::Write;
use std::path::PathBuf;

use oci_publish_core::error::{PublishError, Result};
use parking_lot::Mutex;

/// Output holding the package version URL.
pub const OUTPUT_PACKAGE_URL: &str = "package-url";
/// Output holding the manifest JSON.
pub const OUTPUT_PACKAGE_MANIFEST: &str = "package-manifest";
/// Output holding the manifest digest.
pub const OUTPUT_PACKAGE_MANIFEST_SHA: &str = "package-manifest-sha";
/// Output holding the attestation manifest digest.
pub const OUTPUT_ATTESTATION_MANIFEST_SHA: &str = "attestation-manifest-sha";
/// Output holding the attestation URL.
pub const OUTPUT_ATTESTATION_URL: &str = "attestation-url";

/// Receives named step outputs.
///
/// `set_outputs` commits a whole batch or nothing: a failed call leaves no
/// output of the batch behind.
pub trait OutputSink: Send + Sync {
    fn set_outputs(&self, outputs: &[(String, String)]) -> Result<()>;

    fn set_output(&self, name: &str, value: &str) -> Result<()> {
        self.set_outputs(&[(name.to_string(), value.to_string())])
    }
}

/// Writes outputs to the `$GITHUB_OUTPUT` file, or to stdout when unset.
#[derive(Debug, Clone, Default)]
pub struct GithubOutputs {
    file: Option<PathBuf>,
}

impl GithubOutputs {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }
}

impl OutputSink for GithubOutputs {
    fn set_outputs(&self, outputs: &[(String, String)]) -> Result<()> {
        let Some(path) = &self.file else {
            let rendered: String = outputs
                .iter()
                .map(|(name, value)| format!("{}={}\n", name, value))
                .collect();
            print!("{}", rendered);
            return Ok(());
        };

        let rendered = outputs
            .iter()
            .map(|(name, value)| format_output(name, value))
            .collect::<Result<Vec<_>>>()?
            .concat();

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                PublishError::Config(format!(
                    "Failed to open output file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        file.write_all(rendered.as_bytes()).map_err(|e| {
            PublishError::Config(format!(
                "Failed to write outputs to {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Render one output as a heredoc block.
pub fn format_output(name: &str, value: &str) -> Result<String> {
    let delimiter = format!("ghadelimiter_{}", uuid::Uuid::new_v4());
    if name.contains(&delimiter) || value.contains(&delimiter) {
        return Err(PublishError::Config(format!(
            "Output {} contains the heredoc delimiter",
            name
        )));
    }
    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}

/// Collects outputs in memory.
#[derive(Debug, Default)]
pub struct MemoryOutputs {
    entries: Mutex<Vec<(String, String)>>,
}

impl MemoryOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// All outputs in the order they were set.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.entries.lock().clone()
    }

    /// Value of one output.
    pub fn get(&self, name: &str) -> Option<String> {
        self.entries
            .lock()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl OutputSink for MemoryOutputs {
    fn set_outputs(&self, outputs: &[(String, String)]) -> Result<()> {
        self.entries.lock().extend_from_slice(outputs);
        Ok(())
    }
}
