//! oci-publish CLI entry point.

use clap::Parser;

use oci_publish_cli::commands::{dispatch, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    oci_publish_core::log::init_tracing(cli.log_format, "info");

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
