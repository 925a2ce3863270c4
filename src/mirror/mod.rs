//! The local Git tree of mirror declarations
//!
//! Each mirrored image is a directory `<repository-path>/<tag>/` holding a
//! `Dockerfile` whose only line is `FROM <image>`.

use crate::image::ImageReference;
use crate::registry::DOCKERFILE_NAME;
use crate::{MirrorError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A declared image found in the mirror tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    /// Directory of the Dockerfile relative to the root, `/`-separated
    pub sub_path: String,
    pub image: ImageReference,
}

impl MirrorEntry {
    /// Dockerfile directory as the build rule expects it (`/<sub-path>/`)
    pub fn dockerfile_dir(&self) -> String {
        format!("/{}/", self.sub_path)
    }
}

/// Mirror tree rooted at a local Git working copy
#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and yield every declared image.
    ///
    /// Lazy and in filesystem order. Hidden directories such as `.git` are
    /// skipped. A Dockerfile whose directory cannot be read back as an image
    /// reference yields an error item; the walk continues past it.
    pub fn entries(&self) -> impl Iterator<Item = Result<MirrorEntry>> + '_ {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => return Some(Err(MirrorError::Io(e.into()))),
                };
                if !entry.file_type().is_file() || entry.file_name() != DOCKERFILE_NAME {
                    return None;
                }
                Some(self.entry_for(entry.path()))
            })
    }

    fn entry_for(&self, dockerfile: &Path) -> Result<MirrorEntry> {
        let dir = dockerfile.parent().unwrap_or(&self.root);
        let relative = dir.strip_prefix(&self.root).map_err(|_| {
            MirrorError::InvalidImageRef(format!("{} is outside the mirror root", dir.display()))
        })?;
        let sub_path = relative.to_string_lossy().replace('\\', "/");
        let image = ImageReference::from_mirror_path(&sub_path)?;
        Ok(MirrorEntry { sub_path, image })
    }

    /// Path of an image's Dockerfile relative to the root
    pub fn dockerfile_path(image: &ImageReference) -> PathBuf {
        image.mirror_path().join(DOCKERFILE_NAME)
    }

    /// Write `FROM <image>` into the image's Dockerfile, creating directories.
    ///
    /// Returns the Dockerfile path relative to the root.
    pub fn declare(&self, image: &ImageReference) -> Result<PathBuf> {
        let relative = Self::dockerfile_path(image);
        let dest = self.root.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, dockerfile_contents(image))?;
        tracing::debug!("wrote {}", dest.display());
        Ok(relative)
    }
}

/// Contents of a mirror Dockerfile
pub fn dockerfile_contents(image: &ImageReference) -> String {
    format!("FROM {}", image)
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}
