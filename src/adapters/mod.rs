//! Adapter interfaces for external collaborators.
//!
//! The core consumes two narrow contracts: a code host for PR data and
//! comments, and a language model for free-text analysis. Everything
//! provider-specific stays behind these traits.

pub mod github;
pub mod llm;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{ChangedFile, IssueComment, PrDetails};

pub use github::GitHubClient;
pub use llm::ChatCompletionsClient;

/// Code-hosting API surface the pipeline needs.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// PR metadata
    async fn pr_details(&self, pr_number: u64) -> Result<PrDetails>;

    /// Files changed in a PR
    async fn changed_files(&self, pr_number: u64) -> Result<Vec<ChangedFile>>;

    /// Full file content at a ref; `None` when the path does not exist
    async fn file_content(&self, path: &str, git_ref: &str) -> Result<Option<String>>;

    /// All conversation comments on a PR, chronological
    async fn comments(&self, pr_number: u64) -> Result<Vec<IssueComment>>;

    /// Post a conversation comment
    async fn post_comment(&self, pr_number: u64, body: &str) -> Result<()>;

    /// Add labels to a PR
    async fn add_labels(&self, pr_number: u64, labels: &[String]) -> Result<()>;
}

/// Free-text completion. Failures surface as recoverable errors the
/// calling step converts into a degraded-but-present output.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
