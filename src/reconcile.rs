//! Make the registry match the local mirror declarations
//!
//! For each declared image the reconciler makes sure the destination
//! repository exists, makes sure some build rule produces the tag, and
//! triggers a build when it had to create (or repurpose) that rule. It never
//! waits for builds to finish.

use crate::batch::run_batch;
use crate::mirror::MirrorEntry;
use crate::registry::{ContainerRegistry, RepositorySnapshot, SourceRepository, BUILD_RULE_LIMIT};
use crate::Result;
use tracing::Instrument;

/// What reconciling one image did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A rule for the tag already existed, so nothing was triggered.
    /// The tag itself may not have been built yet.
    AlreadyHandled { rule_id: u64 },
    /// A build was triggered from `rule_id`
    Triggered {
        rule_id: u64,
        created_repository: bool,
        /// The rule was an existing one overwritten because the repository
        /// had no room for another
        reused_rule: bool,
    },
}

/// Reconciles declared images against one registry namespace
pub struct Reconciler<'a, R: ?Sized> {
    registry: &'a R,
    snapshot: &'a RepositorySnapshot,
    source: &'a SourceRepository,
}

impl<'a, R> Reconciler<'a, R>
where
    R: ContainerRegistry + ?Sized,
{
    /// `snapshot` is the set of repositories that existed when the run began
    pub fn new(
        registry: &'a R,
        snapshot: &'a RepositorySnapshot,
        source: &'a SourceRepository,
    ) -> Self {
        Self {
            registry,
            snapshot,
            source,
        }
    }

    /// Reconcile a single declared image. Steps run strictly in order.
    pub async fn reconcile(&self, entry: &MirrorEntry) -> Result<Outcome> {
        let repository = entry.image.repository_name();
        let tag = entry.image.tag();

        let created_repository = if self.snapshot.contains(&repository) {
            tracing::debug!("using existing repository {}", repository);
            false
        } else {
            tracing::info!("repository {} does not exist, creating", repository);
            self.registry
                .create_repository(&repository, self.registry.namespace(), self.source)
                .await?;
            true
        };

        let rules = self.registry.list_build_rules(&repository).await?;
        if let Some(rule) = rules.iter().find(|r| r.tag == tag) {
            tracing::debug!("rule {} already builds tag {}, skipping", rule.id, tag);
            return Ok(Outcome::AlreadyHandled { rule_id: rule.id });
        }

        let dockerfile_dir = entry.dockerfile_dir();
        tracing::info!(
            "creating build rule: dockerfile_dir={}, tag={}",
            dockerfile_dir,
            tag
        );
        let (rule_id, reused_rule) = self.create_rule(&repository, &dockerfile_dir, tag).await?;

        tracing::info!("triggering rule {}", rule_id);
        self.registry.trigger_build(&repository, rule_id).await?;

        Ok(Outcome::Triggered {
            rule_id,
            created_repository,
            reused_rule,
        })
    }

    /// Create a rule, falling back to overwriting one when the repository is
    /// at its rule limit. Returns the rule id and whether it was overwritten.
    ///
    /// The overwritten rule is simply the first one the registry lists. That
    /// order is not defined by the API, so an actively used rule may be
    /// repurposed.
    async fn create_rule(
        &self,
        repository: &str,
        dockerfile_dir: &str,
        tag: &str,
    ) -> Result<(u64, bool)> {
        let err = match self
            .registry
            .create_build_rule(repository, dockerfile_dir, tag)
            .await
        {
            Ok(id) => return Ok((id, false)),
            Err(err) => err,
        };

        let rules = self.registry.list_build_rules(repository).await?;
        match rules.first() {
            Some(rule) if rules.len() >= BUILD_RULE_LIMIT => {
                tracing::warn!(
                    "rule limit ({}) reached, overwriting existing rule {} (tag {})",
                    BUILD_RULE_LIMIT,
                    rule.id,
                    rule.tag
                );
                self.registry
                    .edit_build_rule(repository, rule.id, dockerfile_dir, tag)
                    .await?;
                Ok((rule.id, true))
            }
            _ => Err(err),
        }
    }

    /// Reconcile every entry, at most `concurrency` at once.
    ///
    /// Each entry gets its own result; a failure never stops the others.
    pub async fn run<I>(&self, entries: I, concurrency: usize) -> Vec<(MirrorEntry, Result<Outcome>)>
    where
        I: IntoIterator<Item = MirrorEntry>,
    {
        let reconciler = self;
        run_batch(entries, concurrency, move |entry| async move {
            let span = tracing::info_span!("reconcile", image = %entry.image);
            reconciler.reconcile(&entry).instrument(span).await
        })
        .await
    }
}
