//! Ingestion step: fetches PR metadata, changed files, and file contents
//! from the code host and persists the snapshot every later step reads.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{truncate_chars, Step};
use crate::adapters::CodeHost;
use crate::core::ReviewStore;
use crate::error::StepError;

pub const NAME: &str = "ingestion";

/// Stored patches are capped; full file content is kept separately.
const PATCH_CHAR_LIMIT: usize = 20_000;

/// The PR snapshot all downstream steps work from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionOutput {
    pub title: String,
    pub description: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub head_sha: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub changed_files: Vec<IngestedFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedFile {
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    pub patch: String,
    /// Head-ref file content; `None` when the path is gone at head
    pub content: Option<String>,
}

pub struct IngestionStep {
    store: Arc<ReviewStore>,
    code_host: Arc<dyn CodeHost>,
}

impl IngestionStep {
    pub fn new(store: Arc<ReviewStore>, code_host: Arc<dyn CodeHost>) -> Self {
        Self { store, code_host }
    }
}

#[async_trait]
impl Step for IngestionStep {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, pr_number: u64) -> Result<Value, StepError> {
        info!(pr_number, "ingesting PR");

        let details = self
            .code_host
            .pr_details(pr_number)
            .await
            .map_err(StepError::CodeHost)?;
        let files = self
            .code_host
            .changed_files(pr_number)
            .await
            .map_err(StepError::CodeHost)?;

        let git_ref = if details.head_sha.is_empty() {
            details.head_branch.clone()
        } else {
            details.head_sha.clone()
        };

        let mut changed_files = Vec::with_capacity(files.len());
        for file in files {
            let content = if git_ref.is_empty() {
                None
            } else {
                self.code_host
                    .file_content(&file.filename, &git_ref)
                    .await
                    .map_err(StepError::CodeHost)?
            };
            if content.is_none() {
                debug!(filename = %file.filename, "no head content for file");
            }

            changed_files.push(IngestedFile {
                filename: file.filename,
                status: file.status,
                additions: file.additions,
                deletions: file.deletions,
                changes: file.changes,
                patch: truncate_chars(&file.patch, PATCH_CHAR_LIMIT),
                content,
            });
        }

        let output = IngestionOutput {
            title: details.title,
            description: details.description,
            author: details.author,
            base_branch: details.base_branch,
            head_branch: details.head_branch,
            head_sha: details.head_sha,
            state: details.state,
            created_at: details.created_at,
            updated_at: details.updated_at,
            changed_files,
        };

        info!(
            pr_number,
            files = output.changed_files.len(),
            "ingestion stored"
        );
        Ok(self.store.write_output(pr_number, NAME, &output)?)
    }
}
