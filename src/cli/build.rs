//! `mirror-op build` command implementation

use crate::cli::{declared_entries, MirrorArgs, RegistryArgs};
use crate::config::{self, MirrorConfig, DEFAULT_GITHUB_NAMESPACE, DEFAULT_GITHUB_REPO};
use crate::mirror::{LocalMirror, MirrorEntry};
use crate::reconcile::{Outcome, Reconciler};
use crate::registry::aliyun::AliyunCr;
use crate::registry::{ContainerRegistry, RepositorySnapshot, SourceRepository};
use clap::Args;

/// Arguments for the `build` command
#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,

    /// GitHub account hosting the mirror repository
    #[arg(long, env = "MIRROR_OP_GITHUB_NAMESPACE", default_value = DEFAULT_GITHUB_NAMESPACE)]
    pub github_namespace: String,

    /// GitHub repository holding the Dockerfiles
    #[arg(long, env = "MIRROR_OP_GITHUB_REPO", default_value = DEFAULT_GITHUB_REPO)]
    pub github_repo: String,

    #[command(flatten)]
    pub mirror: MirrorArgs,
}

/// Execute the `build` command
pub async fn execute(args: BuildArgs) -> anyhow::Result<()> {
    let registry_config = args.registry.config()?;
    let source = config::source_repository(&args.github_namespace, &args.github_repo)?;
    let mirror_config = args.mirror.config()?;

    let registry = AliyunCr::new(&registry_config)?;
    let results = build_mirror(&registry, &source, &mirror_config).await?;

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    tracing::info!(
        "{} images reconciled, {} failed",
        results.len() - failed,
        failed
    );

    Ok(())
}

/// Reconcile every image declared under the mirror root.
///
/// Only the initial repository listing can fail the whole run; per-image
/// failures are logged and returned alongside the successes.
pub async fn build_mirror<R>(
    registry: &R,
    source: &SourceRepository,
    mirror_config: &MirrorConfig,
) -> crate::Result<Vec<(MirrorEntry, crate::Result<Outcome>)>>
where
    R: ContainerRegistry + ?Sized,
{
    let snapshot = RepositorySnapshot::fetch(registry).await?;
    tracing::debug!("# of repositories: {}", snapshot.len());

    let mirror = LocalMirror::new(&mirror_config.root);
    let results = Reconciler::new(registry, &snapshot, source)
        .run(declared_entries(&mirror), mirror_config.concurrency)
        .await;

    for (entry, result) in &results {
        match result {
            Ok(Outcome::Triggered { rule_id, .. }) => {
                tracing::info!("{}: triggered build rule {}", entry.image, rule_id)
            }
            Ok(Outcome::AlreadyHandled { .. }) => {
                tracing::debug!("{}: build rule exists", entry.image)
            }
            Err(e) => tracing::warn!("Failed to build {}: {}", entry.image, e),
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::{Call, FakeRegistry};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_build_mirror_reconciles_tree() {
        let tmp = TempDir::new().unwrap();
        for sub_path in ["nginx/1.25", "bitnami/redis/7.2"] {
            let dir = tmp.path().join(sub_path);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("Dockerfile"), "FROM x").unwrap();
        }
        // declaration without a tag directory is skipped
        fs::write(tmp.path().join("Dockerfile"), "FROM x").unwrap();

        let registry = FakeRegistry::new("ns");
        registry.add_repository("nginx", "ns");
        registry.add_rule("nginx", 1, "1.25");
        // same name in a foreign namespace does not count
        registry.add_repository("bitnami_redis", "other");

        let source = SourceRepository {
            namespace: "owner".to_string(),
            name: "docker-mirror".to_string(),
        };
        let mirror_config = MirrorConfig::new(tmp.path(), 2).unwrap();

        let results = build_mirror(&registry, &source, &mirror_config).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| r.is_ok()));

        let mutations = registry.mutations();
        assert!(mutations.contains(&Call::CreateRepository {
            name: "bitnami_redis".to_string(),
            namespace: "ns".to_string(),
        }));
        assert!(!mutations
            .iter()
            .any(|c| matches!(c, Call::CreateRepository { name, .. } if name == "nginx")));
        assert_eq!(
            mutations
                .iter()
                .filter(|c| matches!(c, Call::TriggerBuild { .. }))
                .count(),
            1
        );
    }
}
