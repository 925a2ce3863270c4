//! In-memory registry that records every call, for tests

use super::{
    Build, BuildRule, BuildStatus, ContainerRegistry, Repository, SourceRepository,
    BUILD_RULE_LIMIT, DOCKERFILE_NAME,
};
use crate::{MirrorError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListRepositories { page: u32 },
    CreateRepository { name: String, namespace: String },
    DeleteRepository { name: String, namespace: String },
    ListBuildRules { repository: String },
    CreateBuildRule { repository: String, dockerfile_dir: String, tag: String },
    EditBuildRule { repository: String, rule_id: u64, dockerfile_dir: String, tag: String },
    TriggerBuild { repository: String, rule_id: u64 },
    ListTags { repository: String },
    ListBuilds { repository: String, namespace: String },
}

impl Call {
    /// Whether the call changes remote state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreateRepository { .. }
                | Call::DeleteRepository { .. }
                | Call::CreateBuildRule { .. }
                | Call::EditBuildRule { .. }
                | Call::TriggerBuild { .. }
        )
    }
}

#[derive(Default)]
struct State {
    repositories: Vec<Repository>,
    rules: HashMap<String, Vec<BuildRule>>,
    tags: HashMap<String, Vec<String>>,
    builds: HashMap<String, Vec<Build>>,
    calls: Vec<Call>,
    next_rule_id: u64,
    reject_rule_creation: bool,
    fail_deleting: Option<String>,
}

pub struct FakeRegistry {
    namespace: String,
    state: Mutex<State>,
}

impl FakeRegistry {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            state: Mutex::new(State {
                next_rule_id: 100,
                ..State::default()
            }),
        }
    }

    pub fn add_repository(&self, name: &str, namespace: &str) {
        let mut state = self.state.lock().unwrap();
        let id = state.repositories.len() as u64 + 1;
        state.repositories.push(Repository {
            id,
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
    }

    pub fn add_rule(&self, repository: &str, id: u64, tag: &str) {
        self.state
            .lock()
            .unwrap()
            .rules
            .entry(repository.to_string())
            .or_default()
            .push(BuildRule {
                id,
                tag: tag.to_string(),
                dockerfile_dir: format!("/{}/{}/", repository, tag),
                dockerfile_name: DOCKERFILE_NAME.to_string(),
            });
    }

    pub fn add_tag(&self, repository: &str, tag: &str) {
        self.state
            .lock()
            .unwrap()
            .tags
            .entry(repository.to_string())
            .or_default()
            .push(tag.to_string());
    }

    pub fn add_build(&self, repository: &str, id: &str, status: BuildStatus, tag: &str) {
        self.state
            .lock()
            .unwrap()
            .builds
            .entry(repository.to_string())
            .or_default()
            .push(Build {
                id: id.to_string(),
                status,
                tag: tag.to_string(),
            });
    }

    /// Make every rule creation fail, regardless of the rule count
    pub fn reject_rule_creation(&self) {
        self.state.lock().unwrap().reject_rule_creation = true;
    }

    /// Make deleting `name` fail
    pub fn fail_deleting(&self, name: &str) {
        self.state.lock().unwrap().fail_deleting = Some(name.to_string());
    }

    pub fn rules(&self, repository: &str) -> Vec<BuildRule> {
        self.state
            .lock()
            .unwrap()
            .rules
            .get(repository)
            .cloned()
            .unwrap_or_default()
    }

    pub fn repository_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.repositories.iter().map(|r| r.name.clone()).collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn api_error(code: &str, message: &str) -> MirrorError {
    MirrorError::Api {
        status: 400,
        code: code.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl ContainerRegistry for FakeRegistry {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_repositories(&self, page: u32, page_size: u32) -> Result<Vec<Repository>> {
        self.record(Call::ListRepositories { page });
        let state = self.state.lock().unwrap();
        let start = (page.saturating_sub(1) * page_size) as usize;
        Ok(state
            .repositories
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn create_repository(
        &self,
        name: &str,
        namespace: &str,
        _source: &SourceRepository,
    ) -> Result<()> {
        self.record(Call::CreateRepository {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
        self.add_repository(name, namespace);
        Ok(())
    }

    async fn delete_repository(&self, name: &str, namespace: &str) -> Result<()> {
        self.record(Call::DeleteRepository {
            name: name.to_string(),
            namespace: namespace.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.fail_deleting.as_deref() == Some(name) {
            return Err(api_error("REPO_NOT_EXIST", "repository vanished"));
        }
        state
            .repositories
            .retain(|r| !(r.name == name && r.namespace == namespace));
        Ok(())
    }

    async fn list_build_rules(&self, repository: &str) -> Result<Vec<BuildRule>> {
        self.record(Call::ListBuildRules {
            repository: repository.to_string(),
        });
        Ok(self.rules(repository))
    }

    async fn create_build_rule(
        &self,
        repository: &str,
        dockerfile_dir: &str,
        tag: &str,
    ) -> Result<u64> {
        self.record(Call::CreateBuildRule {
            repository: repository.to_string(),
            dockerfile_dir: dockerfile_dir.to_string(),
            tag: tag.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        if state.reject_rule_creation {
            return Err(api_error("INVALID_PARAMETER", "rule rejected"));
        }
        if state.rules.get(repository).map_or(0, Vec::len) >= BUILD_RULE_LIMIT {
            return Err(api_error("BUILD_RULE_LIMIT_EXCEEDED", "too many rules"));
        }
        let id = state.next_rule_id;
        state.next_rule_id += 1;
        state
            .rules
            .entry(repository.to_string())
            .or_default()
            .push(BuildRule {
                id,
                tag: tag.to_string(),
                dockerfile_dir: dockerfile_dir.to_string(),
                dockerfile_name: DOCKERFILE_NAME.to_string(),
            });
        Ok(id)
    }

    async fn edit_build_rule(
        &self,
        repository: &str,
        rule_id: u64,
        dockerfile_dir: &str,
        tag: &str,
    ) -> Result<()> {
        self.record(Call::EditBuildRule {
            repository: repository.to_string(),
            rule_id,
            dockerfile_dir: dockerfile_dir.to_string(),
            tag: tag.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        let rule = state
            .rules
            .get_mut(repository)
            .and_then(|rules| rules.iter_mut().find(|r| r.id == rule_id))
            .ok_or_else(|| api_error("BUILD_RULE_NOT_EXIST", "no such rule"))?;
        rule.tag = tag.to_string();
        rule.dockerfile_dir = dockerfile_dir.to_string();
        Ok(())
    }

    async fn trigger_build(&self, repository: &str, rule_id: u64) -> Result<()> {
        self.record(Call::TriggerBuild {
            repository: repository.to_string(),
            rule_id,
        });
        Ok(())
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        self.record(Call::ListTags {
            repository: repository.to_string(),
        });
        let state = self.state.lock().unwrap();
        Ok(state.tags.get(repository).cloned().unwrap_or_default())
    }

    async fn list_builds(&self, repository: &str, namespace: &str) -> Result<Vec<Build>> {
        self.record(Call::ListBuilds {
            repository: repository.to_string(),
            namespace: namespace.to_string(),
        });
        let state = self.state.lock().unwrap();
        Ok(state.builds.get(repository).cloned().unwrap_or_default())
    }
}
