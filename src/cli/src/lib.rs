//! oci-publish CLI - publish action packages to an OCI registry.

pub mod commands;
