//! GitHub REST adapter for PR operations.
//!
//! Maps the v3 wire format into the narrow domain shapes the pipeline
//! consumes. The base URL is repo-scoped and overridable, which is also
//! how the wiremock tests point the client at a local server.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use super::CodeHost;
use crate::config::GithubConfig;
use crate::domain::{ChangedFile, IssueComment, PrDetails};

const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
const API_VERSION: &str = "2022-11-28";

/// GitHub API client scoped to one repository.
pub struct GitHubClient {
    /// Repo-scoped base, e.g. https://api.github.com/repos/octo/widgets
    base_url: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    login: String,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    ref_name: String,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PrResponse {
    title: String,
    body: Option<String>,
    user: UserRef,
    base: BranchRef,
    head: BranchRef,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    filename: String,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changes: u64,
    #[serde(default)]
    patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    user: UserRef,
    body: Option<String>,
    created_at: DateTime<Utc>,
}

impl GitHubClient {
    /// Build a client from configuration. Fails when the token or the
    /// repository is missing (and no explicit api_url stands in).
    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .context("GITHUB_TOKEN is not set (env or .prsentry/config.yaml)")?;

        let base_url = match (&config.api_url, &config.repo) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(repo)) => format!("https://api.github.com/repos/{}", repo),
            (None, None) => {
                anyhow::bail!("GITHUB_REPO is not set (env or .prsentry/config.yaml)")
            }
        };

        Ok(Self::new(base_url, token))
    }

    /// Client against an explicit repo-scoped base URL.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            client: reqwest::Client::builder()
                .user_agent(concat!("prsentry/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::GET, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", ACCEPT_HEADER)
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn pr_details(&self, pr_number: u64) -> Result<PrDetails> {
        let response = self
            .get(&format!("/pulls/{}", pr_number))
            .send()
            .await
            .context("Failed to fetch PR details")?
            .error_for_status()
            .context("PR details request rejected")?;

        let pr: PrResponse = response
            .json()
            .await
            .context("Failed to parse PR details response")?;

        Ok(PrDetails {
            title: pr.title,
            description: pr.body.unwrap_or_default(),
            author: pr.user.login,
            base_branch: pr.base.ref_name,
            head_branch: pr.head.ref_name,
            head_sha: pr.head.sha.unwrap_or_default(),
            state: pr.state,
            created_at: pr.created_at,
            updated_at: pr.updated_at,
        })
    }

    async fn changed_files(&self, pr_number: u64) -> Result<Vec<ChangedFile>> {
        let response = self
            .get(&format!("/pulls/{}/files", pr_number))
            .send()
            .await
            .context("Failed to fetch changed files")?
            .error_for_status()
            .context("Changed files request rejected")?;

        let files: Vec<FileResponse> = response
            .json()
            .await
            .context("Failed to parse changed files response")?;

        Ok(files
            .into_iter()
            .map(|f| ChangedFile {
                filename: f.filename,
                status: f.status,
                additions: f.additions,
                deletions: f.deletions,
                changes: f.changes,
                patch: f.patch.unwrap_or_default(),
            })
            .collect())
    }

    async fn file_content(&self, path: &str, git_ref: &str) -> Result<Option<String>> {
        let response = self
            .get(&format!("/contents/{}", path))
            .query(&[("ref", git_ref)])
            .send()
            .await
            .context("Failed to fetch file content")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let content: ContentResponse = response
            .error_for_status()
            .context("File content request rejected")?
            .json()
            .await
            .context("Failed to parse file content response")?;

        match (content.encoding.as_deref(), content.content) {
            (Some("base64"), Some(encoded)) => {
                // GitHub wraps base64 payloads at 60 columns
                let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = BASE64
                    .decode(compact)
                    .context("Failed to decode base64 file content")?;
                let text = String::from_utf8(bytes).context("File content is not valid UTF-8")?;
                Ok(Some(text))
            }
            (_, content) => Ok(Some(content.unwrap_or_default())),
        }
    }

    async fn comments(&self, pr_number: u64) -> Result<Vec<IssueComment>> {
        let response = self
            .get(&format!("/issues/{}/comments", pr_number))
            .send()
            .await
            .context("Failed to fetch PR comments")?
            .error_for_status()
            .context("PR comments request rejected")?;

        let comments: Vec<CommentResponse> = response
            .json()
            .await
            .context("Failed to parse PR comments response")?;

        Ok(comments
            .into_iter()
            .map(|c| IssueComment {
                author: c.user.login,
                body: c.body.unwrap_or_default(),
                created_at: c.created_at,
            })
            .collect())
    }

    async fn post_comment(&self, pr_number: u64, body: &str) -> Result<()> {
        self.request(
            reqwest::Method::POST,
            &format!("/issues/{}/comments", pr_number),
        )
        .json(&serde_json::json!({ "body": body }))
        .send()
        .await
        .context("Failed to post PR comment")?
        .error_for_status()
        .context("PR comment rejected")?;

        Ok(())
    }

    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()> {
        self.request(
            reqwest::Method::POST,
            &format!("/issues/{}/labels", pr_number),
        )
        .json(&serde_json::json!({ "labels": labels }))
        .send()
        .await
        .context("Failed to add PR labels")?
        .error_for_status()
        .context("PR labels rejected")?;

        Ok(())
    }
}
