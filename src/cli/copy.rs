//! `mirror-op copy` command implementation

use crate::config::DEFAULT_LOCAL_GIT_REPO;
use crate::git::Git;
use crate::image::ImageReference;
use crate::mirror::{dockerfile_contents, LocalMirror};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the `copy` command
#[derive(Args)]
pub struct CopyArgs {
    /// Upstream image to mirror, including its tag
    pub image: String,

    /// Local clone of the mirror Git repository
    #[arg(long, env = "MIRROR_OP_LOCAL_GIT_REPO", default_value = DEFAULT_LOCAL_GIT_REPO)]
    pub local_git_repo: PathBuf,

    /// Git executable
    #[arg(long, env = "MIRROR_OP_GIT_BIN", default_value = "git")]
    pub git_bin: PathBuf,

    /// Commit the new Dockerfile (default)
    #[arg(long, overrides_with = "no_commit")]
    pub commit: bool,

    /// Only stage the new Dockerfile
    #[arg(long, overrides_with = "commit")]
    pub no_commit: bool,

    /// Push after committing (default)
    #[arg(long, overrides_with = "no_push")]
    pub push: bool,

    /// Do not push
    #[arg(long, overrides_with = "push")]
    pub no_push: bool,

    /// Print what is written where
    #[arg(long)]
    pub debug: bool,
}

impl CopyArgs {
    pub fn commit(&self) -> bool {
        !self.no_commit
    }

    pub fn push(&self) -> bool {
        !self.no_push
    }
}

/// Execute the `copy` command
pub async fn execute(args: CopyArgs) -> anyhow::Result<()> {
    let image = ImageReference::parse(&args.image)?;
    let mirror = LocalMirror::new(&args.local_git_repo);

    if args.debug {
        eprintln!(
            "writing {} into {}",
            dockerfile_contents(&image),
            mirror
                .root()
                .join(LocalMirror::dockerfile_path(&image))
                .display()
        );
    }

    let git = Git::new(&args.git_bin, mirror.root());
    copy_image(&mirror, &git, &image, args.commit(), args.push()).await?;

    Ok(())
}

/// Declare `image` in the mirror tree, then add, commit and push it.
///
/// Every git step is checked, so a failing commit stops before the push.
pub async fn copy_image(
    mirror: &LocalMirror,
    git: &Git,
    image: &ImageReference,
    commit: bool,
    push: bool,
) -> crate::Result<PathBuf> {
    let dockerfile = mirror.declare(image)?;

    git.add(&dockerfile, true).await?;
    if commit {
        git.commit(&format!("[Add] {}", image), true).await?;
    }
    if push {
        git.push(true).await?;
    }

    tracing::info!("declared {} at {}", image, dockerfile.display());
    Ok(dockerfile)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::git::tests::{fake_git, git_log};
    use crate::MirrorError;
    use std::fs;
    use tempfile::TempDir;

    fn setup(fail_on: Option<&str>) -> (TempDir, LocalMirror, Git) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("m");
        fs::create_dir_all(&root).unwrap();
        let git = Git::new(fake_git(tmp.path(), fail_on), &root);
        (tmp, LocalMirror::new(&root), git)
    }

    #[tokio::test]
    async fn test_copy_writes_and_publishes() {
        let (tmp, mirror, git) = setup(None);
        let image = ImageReference::parse("nginx:1.25").unwrap();

        let dockerfile = copy_image(&mirror, &git, &image, true, true).await.unwrap();

        assert_eq!(dockerfile, PathBuf::from("nginx/1.25/Dockerfile"));
        let contents = fs::read_to_string(tmp.path().join("m/nginx/1.25/Dockerfile")).unwrap();
        assert_eq!(contents, "FROM nginx:1.25");
        assert_eq!(git_log(tmp.path()), vec!["add", "commit", "push"]);
    }

    #[tokio::test]
    async fn test_failed_commit_stops_before_push() {
        let (tmp, mirror, git) = setup(Some("commit"));
        let image = ImageReference::parse("nginx:1.25").unwrap();

        let err = copy_image(&mirror, &git, &image, true, true).await.unwrap_err();

        assert!(matches!(err, MirrorError::Git(_)));
        assert_eq!(git_log(tmp.path()), vec!["add", "commit"]);
    }

    #[tokio::test]
    async fn test_toggles_skip_steps() {
        let (tmp, mirror, git) = setup(None);
        let image = ImageReference::parse("bitnami/redis:7.2").unwrap();

        copy_image(&mirror, &git, &image, false, false).await.unwrap();

        assert_eq!(git_log(tmp.path()), vec!["add"]);
        assert!(tmp.path().join("m/bitnami/redis/7.2/Dockerfile").is_file());
    }

    #[tokio::test]
    async fn test_failed_add_aborts() {
        let (tmp, mirror, git) = setup(Some("add"));
        let image = ImageReference::parse("nginx:1.25").unwrap();

        assert!(copy_image(&mirror, &git, &image, true, true).await.is_err());
        assert_eq!(git_log(tmp.path()), vec!["add"]);
    }
}
