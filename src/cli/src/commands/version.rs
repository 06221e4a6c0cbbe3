//! `oci-publish version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> anyhow::Result<()> {
    println!("oci-publish version {}", oci_publish_core::VERSION);
    Ok(())
}
