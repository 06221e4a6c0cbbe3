//! In-toto provenance statements.

use std::collections::BTreeMap;

use oci_publish_core::error::{PublishError, Result};
use serde::{Deserialize, Serialize};

use super::RepoIdentity;

/// In-toto statement type.
pub const IN_TOTO_STATEMENT_TYPE: &str = "https://in-toto.io/Statement/v1";
/// SLSA provenance predicate type.
pub const SLSA_PROVENANCE_PREDICATE_TYPE: &str = "https://slsa.dev/provenance/v1";
/// Build type recorded in the provenance predicate.
pub const BUILD_TYPE: &str = "https://actions.github.io/buildtypes/workflow/v1";

/// One attested artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSubject {
    pub name: String,
    /// Algorithm to hex digest (e.g. "sha256" => "ab12...")
    pub digest: BTreeMap<String, String>,
}

/// An in-toto v1 statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InTotoStatement {
    #[serde(rename = "_type")]
    pub statement_type: String,
    pub subject: Vec<StatementSubject>,
    #[serde(rename = "predicateType")]
    pub predicate_type: String,
    pub predicate: serde_json::Value,
}

impl InTotoStatement {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Build the provenance statement for a published manifest digest.
pub fn build_statement(subject_digest: &str, identity: &RepoIdentity) -> Result<InTotoStatement> {
    let hex = subject_digest
        .strip_prefix("sha256:")
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            PublishError::Attestation(format!(
                "Cannot attest {}: expected a sha256 digest",
                subject_digest
            ))
        })?;

    let mut digest = BTreeMap::new();
    digest.insert("sha256".to_string(), hex.to_string());

    let mut dependency = serde_json::json!({
        "uri": format!("git+{}@{}", identity.repository, identity.git_ref),
    });
    if let Some(sha) = &identity.sha {
        dependency["digest"] = serde_json::json!({ "gitCommit": sha });
    }

    let predicate = serde_json::json!({
        "buildDefinition": {
            "buildType": BUILD_TYPE,
            "externalParameters": {
                "workflow": {
                    "ref": identity.git_ref,
                    "repository": identity.repository,
                }
            },
            "internalParameters": {
                "github": {
                    "repository_visibility": identity.visibility.to_string(),
                }
            },
            "resolvedDependencies": [dependency],
        },
        "runDetails": {
            "builder": {
                "id": concat!("oci-publish/", env!("CARGO_PKG_VERSION")),
            }
        }
    });

    Ok(InTotoStatement {
        statement_type: IN_TOTO_STATEMENT_TYPE.to_string(),
        subject: vec![StatementSubject {
            name: identity.package_name.clone(),
            digest,
        }],
        predicate_type: SLSA_PROVENANCE_PREDICATE_TYPE.to_string(),
        predicate,
    })
}
