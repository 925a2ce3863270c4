//! `mirror-op clear` command implementation

use crate::cli::RegistryArgs;
use crate::registry::aliyun::AliyunCr;
use crate::registry::{repositories, ContainerRegistry, Repository, REPOSITORY_PAGE_SIZE};
use clap::Args;
use futures_util::TryStreamExt;

/// Arguments for the `clear` command
#[derive(Args)]
pub struct ClearArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,
}

/// Execute the `clear` command
pub async fn execute(args: ClearArgs) -> anyhow::Result<()> {
    let registry_config = args.registry.config()?;
    let registry = AliyunCr::new(&registry_config)?;

    let deleted = clear_namespace(&registry, &registry_config.namespace).await?;
    tracing::info!("deleted {} repositories", deleted);

    Ok(())
}

/// Delete every repository of `namespace`, one at a time. The first failure
/// aborts the run.
pub async fn clear_namespace<R>(registry: &R, namespace: &str) -> crate::Result<usize>
where
    R: ContainerRegistry + ?Sized,
{
    let all: Vec<Repository> = repositories(registry, REPOSITORY_PAGE_SIZE)
        .try_collect()
        .await?;
    tracing::debug!("# of repositories: {}", all.len());

    let mut deleted = 0;
    for repo in all.iter().filter(|r| r.namespace == namespace) {
        tracing::info!("deleting {}/{}", repo.namespace, repo.name);
        registry.delete_repository(&repo.name, &repo.namespace).await?;
        deleted += 1;
    }

    Ok(deleted)
}
