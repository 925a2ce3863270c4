//! Read-only check that declared images have landed in the registry

use crate::batch::run_batch;
use crate::image::ImageReference;
use crate::mirror::MirrorEntry;
use crate::registry::{ContainerRegistry, RepositorySnapshot};
use crate::Result;
use std::fmt;
use tracing::Instrument;

/// Why an image is not ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    MissingRepository,
    MissingRule,
    /// The tag is absent. `build_in_flight` only feeds diagnostics.
    TagAbsent { build_in_flight: bool },
}

impl fmt::Display for NotReady {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReady::MissingRepository => write!(f, "repository does not exist"),
            NotReady::MissingRule => write!(f, "no build rule for the tag"),
            NotReady::TagAbsent {
                build_in_flight: true,
            } => write!(f, "tag does not exist, build pending or building"),
            NotReady::TagAbsent {
                build_in_flight: false,
            } => write!(f, "tag does not exist, no pending build"),
        }
    }
}

/// Result of verifying one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ready,
    NotReady(NotReady),
}

impl Verdict {
    pub fn is_ready(&self) -> bool {
        matches!(self, Verdict::Ready)
    }
}

/// Checks declared images without mutating the registry
pub struct Verifier<'a, R: ?Sized> {
    registry: &'a R,
    snapshot: &'a RepositorySnapshot,
}

impl<'a, R> Verifier<'a, R>
where
    R: ContainerRegistry + ?Sized,
{
    pub fn new(registry: &'a R, snapshot: &'a RepositorySnapshot) -> Self {
        Self { registry, snapshot }
    }

    /// Fails closed: the image is ready only when its repository, a rule for
    /// its tag, and the tag itself all exist.
    pub async fn verify(&self, image: &ImageReference) -> Result<Verdict> {
        let repository = image.repository_name();
        let tag = image.tag();

        if !self.snapshot.contains(&repository) {
            tracing::warn!("repository {} does not exist", repository);
            return Ok(Verdict::NotReady(NotReady::MissingRepository));
        }

        let rules = self.registry.list_build_rules(&repository).await?;
        if !rules.iter().any(|r| r.tag == tag) {
            tracing::warn!("rule for tag {} does not exist", tag);
            return Ok(Verdict::NotReady(NotReady::MissingRule));
        }

        let tags = self.registry.list_tags(&repository).await?;
        if tags.iter().any(|t| t == tag) {
            return Ok(Verdict::Ready);
        }

        let build_in_flight = !self
            .registry
            .list_unfinished_builds(&repository, tag)
            .await?
            .is_empty();
        let reason = NotReady::TagAbsent { build_in_flight };
        tracing::warn!("{}", reason);
        Ok(Verdict::NotReady(reason))
    }

    /// Verify every entry, at most `concurrency` at once
    pub async fn run<I>(&self, entries: I, concurrency: usize) -> Vec<(MirrorEntry, Result<Verdict>)>
    where
        I: IntoIterator<Item = MirrorEntry>,
    {
        let verifier = self;
        run_batch(entries, concurrency, move |entry| async move {
            let span = tracing::info_span!("check", image = %entry.image);
            verifier.verify(&entry.image).instrument(span).await
        })
        .await
    }
}
