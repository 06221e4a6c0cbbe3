use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Repository visibility as reported by the hosting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Internal,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Public
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "internal" => Ok(Self::Internal),
            _ => Err(format!(
                "unknown visibility: '{}' (supported: public, private, internal)",
                s
            )),
        }
    }
}

/// Validated publish configuration.
///
/// Produced once by the configuration layer and passed into the publisher;
/// nothing downstream reads the process environment.
#[derive(Clone)]
pub struct PublishOptions {
    /// OCI repository path (e.g. "octo-org/hello-action"), lowercase
    pub repository: String,

    /// Registry base URL (e.g. "https://ghcr.io/")
    pub registry_url: String,

    /// Registry token, sent base64-encoded as a bearer credential
    pub token: String,

    /// Git ref being released (must be "refs/tags/<tag>")
    pub git_ref: String,

    /// Commit the ref points at, recorded in provenance
    pub sha: Option<String>,

    /// Running against an enterprise server (attestation is skipped)
    pub enterprise: bool,

    /// Source repository visibility
    pub visibility: Visibility,

    /// Directory holding the action sources
    pub workspace_dir: PathBuf,

    /// Root under which staging and archive directories are created
    pub temp_root: PathBuf,
}

impl PublishOptions {
    /// Registry base URL without a trailing slash.
    pub fn registry_base(&self) -> &str {
        self.registry_url.trim_end_matches('/')
    }

    /// Registry host (and port), without scheme or path.
    pub fn registry_host(&self) -> &str {
        let base = self.registry_base();
        let without_scheme = base
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(base);
        without_scheme.split('/').next().unwrap_or(without_scheme)
    }

    /// Fully qualified package name (e.g. "ghcr.io/octo-org/hello-action").
    pub fn package_name(&self) -> String {
        format!("{}/{}", self.registry_host(), self.repository)
    }
}

impl std::fmt::Debug for PublishOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishOptions")
            .field("repository", &self.repository)
            .field("registry_url", &self.registry_url)
            .field("token", &"<redacted>")
            .field("git_ref", &self.git_ref)
            .field("sha", &self.sha)
            .field("enterprise", &self.enterprise)
            .field("visibility", &self.visibility)
            .field("workspace_dir", &self.workspace_dir)
            .field("temp_root", &self.temp_root)
            .finish()
    }
}
