//! Validated configuration for each subcommand
//!
//! CLI arguments (or their `MIRROR_OP_*` environment variables) are turned
//! into these structs before any remote call or file write happens.

use crate::image::Destination;
use crate::registry::signer::Credentials;
use crate::registry::SourceRepository;
use crate::{MirrorError, Result};
use std::path::{Path, PathBuf};

pub const DEFAULT_NAMESPACE: &str = "zh-mirror";
pub const DEFAULT_REGION: &str = "cn-shanghai";
pub const DEFAULT_GITHUB_NAMESPACE: &str = "nanoric-public-cd";
pub const DEFAULT_GITHUB_REPO: &str = "docker-mirror";
pub const DEFAULT_LOCAL_GIT_REPO: &str = "./docker-mirror";
pub const DEFAULT_CONCURRENCY: usize = 8;

fn require(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(MirrorError::Config(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}

/// Where mirrored images land
pub fn destination(namespace: &str, region: &str) -> Result<Destination> {
    Ok(Destination::new(
        require("region", region)?,
        require("namespace", namespace)?,
    ))
}

/// Everything needed to talk to the destination registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub credentials: Credentials,
    pub namespace: String,
    pub region: String,
    /// API endpoint override; defaults to the regional endpoint
    pub endpoint: Option<String>,
}

impl RegistryConfig {
    pub fn new(access_key: &str, access_secret: &str, namespace: &str, region: &str) -> Result<Self> {
        Ok(Self {
            credentials: Credentials {
                access_key_id: require("access key", access_key)?,
                access_key_secret: require("access secret", access_secret)?,
            },
            namespace: require("namespace", namespace)?,
            region: require("region", region)?,
            endpoint: None,
        })
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty());
        self
    }

    /// Base URL of the registry API
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cr.{}.aliyuncs.com", self.region))
    }

    pub fn destination(&self) -> Destination {
        Destination::new(self.region.clone(), self.namespace.clone())
    }
}

/// Build a validated source repository reference
pub fn source_repository(namespace: &str, name: &str) -> Result<SourceRepository> {
    Ok(SourceRepository {
        namespace: require("source namespace", namespace)?,
        name: require("source repository", name)?,
    })
}

/// Local Git working tree plus how hard to hit the registry while walking it
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub root: PathBuf,
    pub concurrency: usize,
}

impl MirrorConfig {
    pub fn new(root: impl AsRef<Path>, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(MirrorError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(MirrorError::Config(format!(
                "local git repository {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            concurrency,
        })
    }
}
