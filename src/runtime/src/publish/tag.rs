//! Release tag validation.

use oci_publish_core::error::{PublishError, Result};

const TAG_REF_PREFIX: &str = "refs/tags/";

/// A validated release tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTag {
    /// Tag name as it appears in the ref (e.g. "v1.2.3")
    pub tag: String,
    /// Parsed version (leading "v" stripped)
    pub version: semver::Version,
}

impl ReleaseTag {
    /// Version string used as the manifest reference.
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }
}

/// Validate a git ref as a semver release tag.
///
/// The ref must be `refs/tags/<tag>`; the tag, with at most one leading `v`
/// removed, must be a full semantic version.
pub fn parse_release_tag(git_ref: &str) -> Result<ReleaseTag> {
    let tag = git_ref
        .strip_prefix(TAG_REF_PREFIX)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            PublishError::Validation(format!(
                "The ref {} is not a valid tag reference.",
                git_ref
            ))
        })?;

    let candidate = tag.strip_prefix('v').unwrap_or(tag);
    let version = semver::Version::parse(candidate).map_err(|_| {
        PublishError::Validation(format!(
            "{} is not a valid semantic version, and so cannot be uploaded as an action package.",
            tag
        ))
    })?;

    Ok(ReleaseTag {
        tag: tag.to_string(),
        version,
    })
}
