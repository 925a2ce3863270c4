//! Aliyun Container Registry client (ROA API, version 2016-06-07)

use crate::config::RegistryConfig;
use crate::registry::signer::{self, Credentials, SigningInput};
use crate::registry::{
    Build, BuildRule, BuildStatus, ContainerRegistry, Repository, SourceRepository,
    DOCKERFILE_NAME, TRACKED_BRANCH,
};
use crate::{MirrorError, Result, APP_NAME, VERSION};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, DATE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// API version sent with every request
pub const API_VERSION: &str = "2016-06-07";

const JSON: &str = "application/json";

/// Registry client bound to one region and namespace
pub struct AliyunCr {
    client: reqwest::Client,
    credentials: Credentials,
    namespace: String,
    region: String,
    endpoint: String,
}

impl AliyunCr {
    /// Create a new registry client
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", APP_NAME, VERSION))
            .build()?;

        Ok(Self {
            client,
            credentials: config.credentials.clone(),
            namespace: config.namespace.clone(),
            region: config.region.clone(),
            endpoint: config.endpoint(),
        })
    }

    /// Sign and send one request, decoding the JSON response
    async fn invoke<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: BTreeMap<String, String>,
        body: Option<Value>,
    ) -> Result<T> {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();

        let mut acs_headers = BTreeMap::new();
        acs_headers.insert(
            "x-acs-signature-method".to_string(),
            signer::SIGNATURE_METHOD.to_string(),
        );
        acs_headers.insert(
            "x-acs-signature-nonce".to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        acs_headers.insert(
            "x-acs-signature-version".to_string(),
            signer::SIGNATURE_VERSION.to_string(),
        );
        acs_headers.insert("x-acs-version".to_string(), API_VERSION.to_string());
        acs_headers.insert("x-acs-region-id".to_string(), self.region.clone());

        let authorization = signer::authorization(
            &self.credentials,
            &SigningInput {
                method: method.as_str(),
                accept: JSON,
                content_md5: "",
                content_type: JSON,
                date: &date,
                acs_headers: &acs_headers,
                path,
                query: &query,
            },
        )?;

        let mut request = self
            .client
            .request(method.clone(), format!("{}{}", self.endpoint, path))
            .query(&query)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON)
            .header(DATE, &date)
            .header(AUTHORIZATION, authorization);
        for (name, value) in &acs_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(serde_json::to_string(&body)?);
        }

        tracing::debug!("{} {}", method, path);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }

        Ok(serde_json::from_str(&text)?)
    }

    fn repo_path(&self, namespace: &str, repository: &str) -> String {
        format!("/repos/{}/{}", namespace, repository)
    }
}

/// Map an error response onto [`MirrorError::Api`], keeping the raw body
/// when it is not the usual `{code, message}` object
fn api_error(status: u16, body: &str) -> MirrorError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => MirrorError::Api {
            status,
            code: err.code,
            message: err.message,
        },
        Err(_) => MirrorError::Api {
            status,
            code: "Unknown".to_string(),
            message: body.to_string(),
        },
    }
}

fn build_rule_body(dockerfile_dir: &str, tag: &str) -> Value {
    json!({
        "BuildRule": {
            "PushType": "GIT_BRANCH",
            "PushName": TRACKED_BRANCH,
            "DockerfileLocation": dockerfile_dir,
            "DockerfileName": DOCKERFILE_NAME,
            "ImageTag": tag,
            "Tag": tag,
        }
    })
}

#[async_trait]
impl ContainerRegistry for AliyunCr {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_repositories(&self, page: u32, page_size: u32) -> Result<Vec<Repository>> {
        let mut query = BTreeMap::new();
        query.insert("Page".to_string(), page.to_string());
        query.insert("PageSize".to_string(), page_size.to_string());

        let body: Envelope<RepoList> = self.invoke(Method::GET, "/repos", query, None).await?;
        Ok(body.data.repos)
    }

    async fn create_repository(
        &self,
        name: &str,
        namespace: &str,
        source: &SourceRepository,
    ) -> Result<()> {
        let body = json!({
            "Repo": {
                "Region": self.region,
                "RepoName": name,
                "RepoType": "PUBLIC",
                "Summary": format!("automatically created by {}.", APP_NAME),
                "RepoNamespaceName": namespace,
                "RepoNamespace": namespace,
                "RepoBuildType": "AUTO_BUILD",
            },
            "RepoSource": {
                "Source": {
                    "SourceRepoType": "GITHUB",
                    "SourceRepoNamespace": source.namespace,
                    "SourceRepoName": source.name,
                },
                "BuildConfig": {
                    "IsAutoBuild": true,
                    "IsOversea": true,
                    "IsDisableCache": false,
                }
            }
        });

        let _: Value = self
            .invoke(Method::PUT, "/repos", BTreeMap::new(), Some(body))
            .await?;
        Ok(())
    }

    async fn delete_repository(&self, name: &str, namespace: &str) -> Result<()> {
        let path = self.repo_path(namespace, name);
        let _: Value = self
            .invoke(Method::DELETE, &path, BTreeMap::new(), None)
            .await?;
        Ok(())
    }

    async fn list_build_rules(&self, repository: &str) -> Result<Vec<BuildRule>> {
        let path = format!("{}/rules", self.repo_path(&self.namespace, repository));
        let body: Envelope<RuleList> = self
            .invoke(Method::GET, &path, BTreeMap::new(), None)
            .await?;
        Ok(body.data.build_rules)
    }

    async fn create_build_rule(
        &self,
        repository: &str,
        dockerfile_dir: &str,
        tag: &str,
    ) -> Result<u64> {
        let path = format!("{}/rules", self.repo_path(&self.namespace, repository));
        let body: Envelope<CreatedRule> = self
            .invoke(
                Method::PUT,
                &path,
                BTreeMap::new(),
                Some(build_rule_body(dockerfile_dir, tag)),
            )
            .await?;
        Ok(body.data.build_rule_id)
    }

    async fn edit_build_rule(
        &self,
        repository: &str,
        rule_id: u64,
        dockerfile_dir: &str,
        tag: &str,
    ) -> Result<()> {
        let path = format!(
            "{}/rules/{}",
            self.repo_path(&self.namespace, repository),
            rule_id
        );
        let _: Value = self
            .invoke(
                Method::POST,
                &path,
                BTreeMap::new(),
                Some(build_rule_body(dockerfile_dir, tag)),
            )
            .await?;
        Ok(())
    }

    async fn trigger_build(&self, repository: &str, rule_id: u64) -> Result<()> {
        let path = format!(
            "{}/rules/{}/build",
            self.repo_path(&self.namespace, repository),
            rule_id
        );
        let _: Value = self
            .invoke(Method::PUT, &path, BTreeMap::new(), None)
            .await?;
        Ok(())
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let path = format!("{}/tags", self.repo_path(&self.namespace, repository));
        let body: Envelope<TagList> = self
            .invoke(Method::GET, &path, BTreeMap::new(), None)
            .await?;
        Ok(body.data.tags.into_iter().map(|t| t.tag).collect())
    }

    async fn list_builds(&self, repository: &str, namespace: &str) -> Result<Vec<Build>> {
        let path = format!("{}/build", self.repo_path(namespace, repository));
        let body: Envelope<BuildList> = self
            .invoke(Method::GET, &path, BTreeMap::new(), None)
            .await?;
        Ok(body
            .data
            .builds
            .into_iter()
            .map(|b| Build {
                id: b.build_id,
                status: b.build_status,
                tag: b.image.tag,
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "Code")]
    code: String,
    #[serde(alias = "Message", default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RepoList {
    #[serde(default)]
    repos: Vec<Repository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleList {
    #[serde(default)]
    build_rules: Vec<BuildRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedRule {
    build_rule_id: u64,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct BuildList {
    #[serde(default)]
    builds: Vec<BuildEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildEntry {
    build_id: String,
    build_status: BuildStatus,
    image: BuildImage,
}

#[derive(Debug, Deserialize)]
struct BuildImage {
    tag: String,
}
