//! Image references and the destination naming scheme
//!
//! An upstream reference such as `bitnami/redis:7.2` is mirrored into the
//! destination namespace as repository `bitnami_redis` with tag `7.2`. The
//! same reference is stored in the local Git tree under `bitnami/redis/7.2/`.

use crate::{MirrorError, Result};
use std::fmt;
use std::path::PathBuf;

/// Domain suffix of the destination registry's pull endpoints
pub const REGISTRY_DOMAIN: &str = "aliyuncs.com";

/// Upstream image reference: a slash-separated repository path and a tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Repository path (e.g., "nginx", "bitnami/redis", "ghcr.io/owner/repo")
    pub repository: String,
    /// Tag (e.g., "1.25", "latest")
    pub tag: String,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// The tag is everything after the last `:`. A reference without a tag is
    /// rejected with [`MirrorError::MissingTag`] rather than defaulting to
    /// `latest`, because the tag decides where the Dockerfile lives.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(MirrorError::InvalidImageRef(
                "Empty image reference".to_string(),
            ));
        }

        let (repository, tag) = reference
            .rsplit_once(':')
            .ok_or_else(|| MirrorError::MissingTag(reference.to_string()))?;

        // `localhost:5000/app` has a colon, but it belongs to the registry host
        if tag.contains('/') || tag.contains('\\') {
            return Err(MirrorError::MissingTag(reference.to_string()));
        }

        if repository.is_empty() || tag.is_empty() {
            return Err(MirrorError::InvalidImageRef(reference.to_string()));
        }

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Rebuild a reference from a mirror sub-path such as `bitnami/redis/7.2`.
    ///
    /// Every segment but the last is the repository path, the last is the tag.
    /// Both `/` and `\` separate segments.
    pub fn from_mirror_path(sub_path: &str) -> Result<Self> {
        let segments: Vec<&str> = sub_path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();

        match segments.split_last() {
            Some((tag, repository)) if !repository.is_empty() => Ok(Self {
                repository: repository.join("/"),
                tag: tag.to_string(),
            }),
            _ => Err(MirrorError::InvalidImageRef(format!(
                "mirror path '{}' needs at least a repository and a tag directory",
                sub_path
            ))),
        }
    }

    /// Repository name in the destination registry (`/` and `\` become `_`)
    pub fn repository_name(&self) -> String {
        self.repository.replace(['/', '\\'], "_")
    }

    /// Get the tag
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Directory of this image's Dockerfile, relative to the mirror root
    pub fn mirror_path(&self) -> PathBuf {
        let mut path: PathBuf = self.repository.split('/').collect();
        path.push(&self.tag);
        path
    }

    /// Fully-qualified pull reference of the mirrored image
    pub fn destination_reference(&self, destination: &Destination) -> String {
        format!(
            "{}/{}/{}:{}",
            destination.registry_host(),
            destination.namespace,
            self.repository_name(),
            self.tag
        )
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Region and namespace an image is mirrored into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub region: String,
    pub namespace: String,
}

impl Destination {
    pub fn new(region: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            namespace: namespace.into(),
        }
    }

    /// Registry host serving pulls for the region
    pub fn registry_host(&self) -> String {
        format!("registry.{}.{}", self.region, REGISTRY_DOMAIN)
    }
}
