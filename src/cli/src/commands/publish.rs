//! `oci-publish publish` command: package and publish the current release.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Args;
use oci_publish_core::{PublishOptions, Visibility};
use oci_publish_runtime::{
    AttestationBinder, CommandSigner, GithubOutputs, Publisher, RegistryClient, ReqwestTransport,
};

const DEFAULT_REGISTRY_URL: &str = "https://ghcr.io/";
const PUBLIC_SERVER_URL: &str = "https://github.com";

#[derive(Args, Clone, Debug, Default)]
pub struct PublishArgs {
    /// Source repository ("owner/name")
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    /// Git ref being released (must be "refs/tags/<semver>")
    #[arg(long = "ref", env = "GITHUB_REF")]
    pub git_ref: Option<String>,

    /// Commit the ref points at
    #[arg(long, env = "GITHUB_SHA")]
    pub sha: Option<String>,

    /// Registry token
    #[arg(long, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Fallback registry token
    #[arg(long, env = "GITHUB_TOKEN", hide = true, hide_env_values = true)]
    pub github_token: Option<String>,

    /// Registry base URL
    #[arg(long, env = "GITHUB_REGISTRY_URL")]
    pub registry_url: Option<String>,

    /// Server URL; anything other than github.com is an enterprise server
    #[arg(long, env = "GITHUB_SERVER_URL")]
    pub server_url: Option<String>,

    /// Source repository visibility
    #[arg(long, env = "INPUT_VISIBILITY", default_value = "public")]
    pub visibility: Visibility,

    /// Directory holding the action sources
    #[arg(long, env = "GITHUB_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Root for temporary directories
    #[arg(long, env = "RUNNER_TEMP")]
    pub temp_dir: Option<PathBuf>,

    /// File receiving step outputs (stdout when unset)
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub output_file: Option<PathBuf>,

    /// Command that signs provenance statements
    #[arg(long, env = "INPUT_SIGNER")]
    pub signer: Option<String>,
}

/// Validate raw arguments into publish options.
pub fn resolve_options(args: &PublishArgs) -> anyhow::Result<PublishOptions> {
    let repository = required(&args.repository, "repository", "GITHUB_REPOSITORY")?;
    let mut parts = repository.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {}
        _ => bail!(
            "Invalid repository '{}': expected the form owner/name",
            repository
        ),
    }

    let git_ref = required(&args.git_ref, "ref", "GITHUB_REF")?;

    let token = args
        .token
        .clone()
        .or_else(|| args.github_token.clone())
        .filter(|t| !t.is_empty())
        .context("Missing registry token (set --token, INPUT_GITHUB_TOKEN or GITHUB_TOKEN)")?;

    let registry_url = args
        .registry_url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
    validate_url(&registry_url)?;

    let enterprise = match &args.server_url {
        Some(server) if !server.trim().is_empty() => {
            server.trim().trim_end_matches('/') != PUBLIC_SERVER_URL
        }
        _ => false,
    };

    let workspace_dir = match &args.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine the current directory")?,
    };
    let temp_root = args.temp_dir.clone().unwrap_or_else(std::env::temp_dir);

    Ok(PublishOptions {
        repository: repository.to_lowercase(),
        registry_url,
        token,
        git_ref,
        sha: args.sha.clone().filter(|s| !s.is_empty()),
        enterprise,
        visibility: args.visibility,
        workspace_dir,
        temp_root,
    })
}

fn required(value: &Option<String>, flag: &str, env: &str) -> anyhow::Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => bail!("Missing required value --{} (or {})", flag, env),
    }
}

fn validate_url(url: &str) -> anyhow::Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .with_context(|| format!("Invalid registry URL '{}': expected http(s)://", url))?;
    if rest.split('/').next().map_or(true, |host| host.is_empty()) {
        bail!("Invalid registry URL '{}': missing host", url);
    }
    Ok(())
}

pub async fn execute(args: PublishArgs) -> anyhow::Result<()> {
    let options = resolve_options(&args)?;
    tracing::debug!(?options, "Resolved publish options");

    let transport = Arc::new(ReqwestTransport::new()?);
    let client = RegistryClient::from_options(transport, &options);
    let outputs = Arc::new(GithubOutputs::new(args.output_file.clone()));

    let mut publisher = Publisher::new(options.clone(), client.clone(), outputs);
    if !options.enterprise {
        let command = args.signer.as_deref().filter(|s| !s.trim().is_empty()).context(
            "A signer command is required to attest packages (set --signer or INPUT_SIGNER)",
        )?;
        let signer = CommandSigner::from_command_line(command)?;
        let binder = AttestationBinder::new(Arc::new(signer), client);
        publisher = publisher.with_attestor(Arc::new(binder));
    }

    let outcome = publisher.run().await?;
    tracing::info!(
        version = %outcome.version,
        package_url = %outcome.package_url,
        "Published action package"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> PublishArgs {
        PublishArgs {
            repository: Some("Octo-Org/Hello-Action".to_string()),
            git_ref: Some("refs/tags/v1.0.0".to_string()),
            token: Some("secret".to_string()),
            workspace: Some(PathBuf::from("/work")),
            temp_dir: Some(PathBuf::from("/tmp/runner")),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_defaults() {
        let options = resolve_options(&args()).unwrap();
        assert_eq!(options.repository, "octo-org/hello-action");
        assert_eq!(options.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(options.git_ref, "refs/tags/v1.0.0");
        assert!(!options.enterprise);
        assert_eq!(options.visibility, Visibility::Public);
        assert_eq!(options.workspace_dir, PathBuf::from("/work"));
        assert_eq!(options.temp_root, PathBuf::from("/tmp/runner"));
    }

    #[test]
    fn test_resolve_enterprise_detection() {
        let mut a = args();
        a.server_url = Some("https://github.com/".to_string());
        assert!(!resolve_options(&a).unwrap().enterprise);

        a.server_url = Some("https://github.example.com".to_string());
        assert!(resolve_options(&a).unwrap().enterprise);
    }

    #[test]
    fn test_resolve_token_fallback() {
        let mut a = args();
        a.token = None;
        a.github_token = Some("fallback".to_string());
        assert_eq!(resolve_options(&a).unwrap().token, "fallback");

        a.github_token = None;
        let err = resolve_options(&a).unwrap_err();
        assert!(err.to_string().contains("Missing registry token"));
    }

    #[test]
    fn test_resolve_rejects_bad_repository() {
        for repo in ["hello-action", "a/b/c", "/name", "owner/"] {
            let mut a = args();
            a.repository = Some(repo.to_string());
            assert!(resolve_options(&a).is_err(), "{repo} should be rejected");
        }
    }

    #[test]
    fn test_resolve_requires_ref() {
        let mut a = args();
        a.git_ref = None;
        let err = resolve_options(&a).unwrap_err();
        assert!(err.to_string().contains("--ref"));
    }

    #[test]
    fn test_resolve_validates_registry_url() {
        let mut a = args();
        a.registry_url = Some("ftp://registry".to_string());
        assert!(resolve_options(&a).is_err());

        a.registry_url = Some("https://".to_string());
        assert!(resolve_options(&a).is_err());

        a.registry_url = Some("http://localhost:5000/".to_string());
        assert_eq!(
            resolve_options(&a).unwrap().registry_url,
            "http://localhost:5000/"
        );
    }

    #[test]
    fn test_cli_parses_publish_flags() {
        use crate::commands::{Cli, Command};
        use clap::Parser;

        let cli = Cli::try_parse_from([
            "oci-publish",
            "--log-format",
            "json",
            "publish",
            "--repository",
            "o/a",
            "--ref",
            "refs/tags/v1.0.0",
            "--visibility",
            "private",
        ])
        .unwrap();
        assert_eq!(cli.log_format, oci_publish_core::LogFormat::Json);
        match cli.command {
            Command::Publish(args) => {
                assert_eq!(args.repository.as_deref(), Some("o/a"));
                assert_eq!(args.visibility, Visibility::Private);
            }
            Command::Version(_) => panic!("expected publish"),
        }
    }
}
