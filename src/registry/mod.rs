//! Destination registry contract
//!
//! [`ContainerRegistry`] has one method per remote operation the reconciler
//! and verifier need. [`aliyun::AliyunCr`] implements it against the Aliyun
//! Container Registry API.

pub mod aliyun;
pub mod signer;

#[cfg(test)]
pub(crate) mod fake;

use crate::{MirrorError, Result};
use async_trait::async_trait;
use futures_util::stream::{self, Stream, TryStreamExt};
use serde::Deserialize;
use std::collections::HashMap;

/// Page size used when walking the repository listing
pub const REPOSITORY_PAGE_SIZE: u32 = 100;

/// Build rules a single repository may hold before creation is refused
pub const BUILD_RULE_LIMIT: usize = 5;

/// Branch every build rule tracks
pub const TRACKED_BRANCH: &str = "master";

/// Dockerfile name every build rule points at
pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// Repository inside the destination registry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    #[serde(rename = "repoId", default)]
    pub id: u64,
    #[serde(rename = "repoName")]
    pub name: String,
    #[serde(rename = "repoNamespace")]
    pub namespace: String,
}

/// Rule binding a branch and Dockerfile directory to an output tag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildRule {
    #[serde(rename = "buildRuleId")]
    pub id: u64,
    #[serde(rename = "imageTag")]
    pub tag: String,
    #[serde(rename = "dockerfileLocation", default)]
    pub dockerfile_dir: String,
    #[serde(rename = "dockerfileName", default = "default_dockerfile_name")]
    pub dockerfile_name: String,
}

fn default_dockerfile_name() -> String {
    DOCKERFILE_NAME.to_string()
}

/// Status of a remote build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildStatus {
    Pending,
    Building,
    Success,
    Failed,
    #[serde(other)]
    Other,
}

impl BuildStatus {
    /// Whether the build may still produce its tag
    pub fn is_in_flight(self) -> bool {
        matches!(self, BuildStatus::Pending | BuildStatus::Building)
    }
}

/// One invocation of a build rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub id: String,
    pub status: BuildStatus,
    pub tag: String,
}

/// External source repository hosting the Dockerfile tree (a GitHub repo)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRepository {
    pub namespace: String,
    pub name: String,
}

/// Operations against the destination registry.
///
/// Every method is one remote call. Implementations must allow concurrent
/// outstanding calls from a shared reference.
#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Namespace the registry operates in unless told otherwise
    fn namespace(&self) -> &str;

    /// One page of the account's repositories, across all its namespaces
    async fn list_repositories(&self, page: u32, page_size: u32) -> Result<Vec<Repository>>;

    /// Create an auto-build repository wired to `source`. Not idempotent.
    async fn create_repository(
        &self,
        name: &str,
        namespace: &str,
        source: &SourceRepository,
    ) -> Result<()>;

    async fn delete_repository(&self, name: &str, namespace: &str) -> Result<()>;

    async fn list_build_rules(&self, repository: &str) -> Result<Vec<BuildRule>>;

    /// Create a build rule and return its id. Fails once the repository
    /// already holds [`BUILD_RULE_LIMIT`] rules.
    async fn create_build_rule(
        &self,
        repository: &str,
        dockerfile_dir: &str,
        tag: &str,
    ) -> Result<u64>;

    /// Overwrite an existing rule's definition in place
    async fn edit_build_rule(
        &self,
        repository: &str,
        rule_id: u64,
        dockerfile_dir: &str,
        tag: &str,
    ) -> Result<()>;

    /// Start a build. Returns once the build is queued, not when it finishes.
    async fn trigger_build(&self, repository: &str, rule_id: u64) -> Result<()>;

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>>;

    async fn list_builds(&self, repository: &str, namespace: &str) -> Result<Vec<Build>>;

    /// Builds for `tag` that are still pending or building
    async fn list_unfinished_builds(&self, repository: &str, tag: &str) -> Result<Vec<Build>> {
        let builds = self.list_builds(repository, self.namespace()).await?;
        Ok(builds
            .into_iter()
            .filter(|b| b.tag == tag && b.status.is_in_flight())
            .collect())
    }
}

/// Stream every repository, fetching one page at a time.
///
/// Paging stops at the first page shorter than `page_size`. Each call starts
/// a fresh walk from page 1.
pub fn repositories<R>(
    registry: &R,
    page_size: u32,
) -> impl Stream<Item = Result<Repository>> + '_
where
    R: ContainerRegistry + ?Sized,
{
    stream::try_unfold(Some(1u32), move |page| async move {
        let Some(page) = page else {
            return Ok(None);
        };

        let batch = registry.list_repositories(page, page_size).await?;
        tracing::debug!("repository page {}: {} entries", page, batch.len());

        let next = if batch.is_empty() || batch.len() < page_size as usize {
            None
        } else {
            Some(page + 1)
        };
        Ok::<_, MirrorError>(Some((batch, next)))
    })
    .map_ok(|batch| stream::iter(batch.into_iter().map(Ok::<_, MirrorError>)))
    .try_flatten()
}

/// Repositories of one namespace known to exist at the start of a run,
/// keyed by name.
///
/// Taken once and shared read-only; repositories created by other actors
/// during the run are not seen.
#[derive(Debug, Clone, Default)]
pub struct RepositorySnapshot {
    repositories: HashMap<String, Repository>,
}

impl RepositorySnapshot {
    /// Drain the full repository listing, keeping the repositories of the
    /// registry's own namespace
    pub async fn fetch<R>(registry: &R) -> Result<Self>
    where
        R: ContainerRegistry + ?Sized,
    {
        let namespace = registry.namespace();
        let all: Vec<Repository> = repositories(registry, REPOSITORY_PAGE_SIZE)
            .try_filter(|r| futures_util::future::ready(r.namespace == namespace))
            .try_collect()
            .await?;
        Ok(Self::from_repositories(all))
    }

    pub fn from_repositories(repositories: impl IntoIterator<Item = Repository>) -> Self {
        Self {
            repositories: repositories
                .into_iter()
                .map(|r| (r.name.clone(), r))
                .collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.repositories.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Repository> {
        self.repositories.get(name)
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Repository> {
        self.repositories.values()
    }
}
