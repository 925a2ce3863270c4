//! CLI command definitions and handlers

pub mod build;
pub mod check;
pub mod clear;
pub mod copy;
pub mod name;

use crate::config::{
    self, RegistryConfig, DEFAULT_CONCURRENCY, DEFAULT_LOCAL_GIT_REPO, DEFAULT_NAMESPACE,
    DEFAULT_REGION,
};
use crate::image::Destination;
use crate::mirror::{LocalMirror, MirrorEntry};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// mirror-op - mirror public images into a private Aliyun container registry
#[derive(Parser)]
#[command(name = "mirror-op")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(
        long,
        global = true,
        env = "MIRROR_OP_LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the mirrored reference of an image
    Name(name::NameArgs),

    /// Declare an image in the local mirror repository and commit it
    Copy(copy::CopyArgs),

    /// Create repositories and build rules for every declared image
    Build(build::BuildArgs),

    /// Check which declared images have been mirrored
    Check(check::CheckArgs),

    /// Delete every repository in the namespace
    Clear(clear::ClearArgs),
}

/// Destination namespace and region
#[derive(Args, Debug, Clone)]
pub struct DestinationArgs {
    /// Registry namespace images are mirrored into
    #[arg(long, env = "MIRROR_OP_CR_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub cr_namespace: String,

    /// Registry region
    #[arg(long, env = "MIRROR_OP_CR_REGION", default_value = DEFAULT_REGION)]
    pub cr_region: String,
}

impl DestinationArgs {
    pub fn destination(&self) -> crate::Result<Destination> {
        config::destination(&self.cr_namespace, &self.cr_region)
    }
}

/// Registry credentials and location
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Access key id
    #[arg(long, env = "MIRROR_OP_CR_ACCESS_KEY", hide_env_values = true)]
    pub cr_access_key: String,

    /// Access key secret
    #[arg(long, env = "MIRROR_OP_CR_ACCESS_SECRET", hide_env_values = true)]
    pub cr_access_secret: String,

    #[command(flatten)]
    pub destination: DestinationArgs,

    /// Registry API endpoint (defaults to https://cr.<region>.aliyuncs.com)
    #[arg(long, env = "MIRROR_OP_CR_ENDPOINT")]
    pub cr_endpoint: Option<String>,
}

impl RegistryArgs {
    pub fn config(&self) -> crate::Result<RegistryConfig> {
        Ok(RegistryConfig::new(
            &self.cr_access_key,
            &self.cr_access_secret,
            &self.destination.cr_namespace,
            &self.destination.cr_region,
        )?
        .with_endpoint(self.cr_endpoint.clone()))
    }
}

/// Local mirror repository to walk
#[derive(Args, Debug, Clone)]
pub struct MirrorArgs {
    /// Local clone of the mirror Git repository
    #[arg(long, env = "MIRROR_OP_LOCAL_GIT_REPO", default_value = DEFAULT_LOCAL_GIT_REPO)]
    pub local_git_repo: PathBuf,

    /// Images processed at the same time
    #[arg(long, env = "MIRROR_OP_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

impl MirrorArgs {
    pub fn config(&self) -> crate::Result<config::MirrorConfig> {
        config::MirrorConfig::new(&self.local_git_repo, self.concurrency)
    }
}

/// Declared images of the mirror tree; unreadable declarations are logged
/// and skipped
pub(crate) fn declared_entries(mirror: &LocalMirror) -> impl Iterator<Item = MirrorEntry> + '_ {
    mirror.entries().filter_map(|entry| match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!("skipping declaration: {}", e);
            None
        }
    })
}
