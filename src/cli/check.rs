//! `mirror-op check` command implementation

use crate::cli::{declared_entries, MirrorArgs, RegistryArgs};
use crate::config::MirrorConfig;
use crate::image::Destination;
use crate::mirror::{LocalMirror, MirrorEntry};
use crate::registry::aliyun::AliyunCr;
use crate::registry::{ContainerRegistry, RepositorySnapshot};
use crate::verify::{Verdict, Verifier};
use clap::Args;

/// Arguments for the `check` command
#[derive(Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub mirror: MirrorArgs,
}

/// Execute the `check` command
pub async fn execute(args: CheckArgs) -> anyhow::Result<()> {
    let registry_config = args.registry.config()?;
    let mirror_config = args.mirror.config()?;

    let registry = AliyunCr::new(&registry_config)?;
    let results = check_mirror(&registry, &mirror_config).await?;

    for line in report(&results, &registry_config.destination()) {
        println!("{}", line);
    }

    Ok(())
}

/// Verify every image declared under the mirror root
pub async fn check_mirror<R>(
    registry: &R,
    mirror_config: &MirrorConfig,
) -> crate::Result<Vec<(MirrorEntry, crate::Result<Verdict>)>>
where
    R: ContainerRegistry + ?Sized,
{
    let snapshot = RepositorySnapshot::fetch(registry).await?;
    tracing::debug!("# of repositories: {}", snapshot.len());

    let mirror = LocalMirror::new(&mirror_config.root);
    Ok(Verifier::new(registry, &snapshot)
        .run(declared_entries(&mirror), mirror_config.concurrency)
        .await)
}

/// One stdout line per verified image. Errors are logged, not printed.
pub fn report(
    results: &[(MirrorEntry, crate::Result<Verdict>)],
    destination: &Destination,
) -> Vec<String> {
    results
        .iter()
        .filter_map(|(entry, result)| match result {
            Ok(Verdict::Ready) => Some(format!(
                "{} -> {}",
                entry.image,
                entry.image.destination_reference(destination)
            )),
            Ok(Verdict::NotReady(_)) => Some(format!("not passed: {}", entry.image)),
            Err(e) => {
                tracing::error!("error checking {}: {}", entry.image, e);
                None
            }
        })
        .collect()
}
