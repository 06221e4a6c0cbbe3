//! oci-publish Core - Foundational Types
//!
//! Error taxonomy, the validated publish configuration and logging setup
//! shared by the runtime and the CLI.

pub mod config;
pub mod error;
pub mod log;

// Re-export commonly used types
pub use config::{PublishOptions, Visibility};
pub use error::{PublishError, RegistryErrorDetail, Result};
pub use log::LogFormat;

/// oci-publish version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
