//! Thin async wrapper over the `git` binary

use crate::{MirrorError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Runs git subcommands inside one working tree
#[derive(Debug, Clone)]
pub struct Git {
    bin: PathBuf,
    cwd: PathBuf,
}

impl Git {
    pub fn new(bin: impl AsRef<Path>, cwd: impl AsRef<Path>) -> Self {
        Self {
            bin: bin.as_ref().to_path_buf(),
            cwd: cwd.as_ref().to_path_buf(),
        }
    }

    pub async fn add(&self, path: &Path, check: bool) -> Result<()> {
        let path = path.to_string_lossy().into_owned();
        self.execute(&["add", path.as_str()], check).await
    }

    pub async fn commit(&self, message: &str, check: bool) -> Result<()> {
        self.execute(&["commit", "-m", message], check).await
    }

    pub async fn push(&self, check: bool) -> Result<()> {
        self.execute(&["push"], check).await
    }

    /// Run `git <args>`. With `check`, a non-zero exit is an error; without
    /// it the exit status is only logged.
    async fn execute(&self, args: &[&str], check: bool) -> Result<()> {
        tracing::debug!("{} {}", self.bin.display(), args.join(" "));

        let status = Command::new(&self.bin)
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| MirrorError::Git(format!("failed to run {}: {}", self.bin.display(), e)))?;

        if status.success() {
            return Ok(());
        }

        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        if check {
            Err(MirrorError::Git(format!(
                "git {} exited with {}",
                args.first().copied().unwrap_or_default(),
                code
            )))
        } else {
            tracing::warn!("git {} exited with {} (ignored)", args.join(" "), code);
            Ok(())
        }
    }
}
