//! CLI command definitions and dispatch.

mod publish;
mod version;

use clap::{Parser, Subcommand};
use oci_publish_core::LogFormat;

pub use publish::{resolve_options, PublishArgs};

/// oci-publish: package an action and publish it to an OCI registry.
#[derive(Parser)]
#[command(name = "oci-publish", version, about)]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Package the workspace and publish it for the current release tag
    Publish(PublishArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI command to its handler.
pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Publish(args) => publish::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
