//! Summarizer step: LLM summary of the PR.
//!
//! A failed completion degrades the output instead of failing the run;
//! advisory analysis is never worth halting the pipeline over.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::ingestion::{self, IngestionOutput};
use super::Step;
use crate::adapters::LanguageModel;
use crate::core::ReviewStore;
use crate::error::StepError;

pub const NAME: &str = "summarizer";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerOutput {
    pub summary: String,
    pub summary_length: usize,
    pub files_analyzed: usize,
    pub generation_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct SummarizerStep {
    store: Arc<ReviewStore>,
    llm: Arc<dyn LanguageModel>,
}

impl SummarizerStep {
    pub fn new(store: Arc<ReviewStore>, llm: Arc<dyn LanguageModel>) -> Self {
        Self { store, llm }
    }
}

#[async_trait]
impl Step for SummarizerStep {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, pr_number: u64) -> Result<Value, StepError> {
        let pr: IngestionOutput = self
            .store
            .read_output(pr_number, ingestion::NAME)?
            .ok_or(StepError::MissingDependency {
                step: NAME,
                dependency: ingestion::NAME,
            })?;

        let files_analyzed = pr.changed_files.len();
        let prompt = build_prompt(&pr);

        let output = match self.llm.complete(&prompt).await {
            Ok(summary) => {
                info!(pr_number, length = summary.len(), "summary generated");
                SummarizerOutput {
                    summary_length: summary.chars().count(),
                    summary,
                    files_analyzed,
                    generation_success: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(pr_number, error = %e, "summary generation failed; storing degraded output");
                SummarizerOutput {
                    summary: format!("Failed to generate summary: {}", e),
                    summary_length: 0,
                    files_analyzed,
                    generation_success: false,
                    error: Some(e.to_string()),
                }
            }
        };

        Ok(self.store.write_output(pr_number, NAME, &output)?)
    }
}

fn build_prompt(pr: &IngestionOutput) -> String {
    let files_json =
        serde_json::to_string_pretty(&pr.changed_files).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Please provide a concise summary of this pull request:\n\
         \n\
         Title: {}\n\
         Description: {}\n\
         \n\
         Changed Files ({} files):\n\
         {}\n\
         \n\
         Please summarize:\n\
         1. What this PR aims to accomplish\n\
         2. Key changes made\n\
         3. Potential impact areas\n\
         4. Any notable patterns or concerns\n\
         \n\
         Keep the summary professional and technical.",
        pr.title,
        pr.description,
        pr.changed_files.len(),
        files_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Err(anyhow!("model endpoint unreachable"))
        }
    }

    struct CannedModel;

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok("This PR adds a widget.".to_string())
        }
    }

    fn seed_ingestion(store: &ReviewStore, pr_number: u64) {
        let pr = IngestionOutput {
            title: "Add widget".to_string(),
            description: "Adds the widget module.".to_string(),
            author: "octocat".to_string(),
            base_branch: "main".to_string(),
            head_branch: "feature/widget".to_string(),
            head_sha: "abc".to_string(),
            state: "open".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            changed_files: vec![],
        };
        store.write_output(pr_number, ingestion::NAME, &pr).unwrap();
    }

    #[tokio::test]
    async fn test_successful_summary() {
        let store = Arc::new(ReviewStore::open_in_memory().unwrap());
        seed_ingestion(&store, 7);

        let step = SummarizerStep::new(store.clone(), Arc::new(CannedModel));
        let payload = step.run(7).await.unwrap();
        assert_eq!(payload["generation_success"], true);
        assert_eq!(payload["summary"], "This PR adds a widget.");
    }

    #[tokio::test]
    async fn test_llm_failure_degrades_but_writes_output() {
        let store = Arc::new(ReviewStore::open_in_memory().unwrap());
        seed_ingestion(&store, 7);

        let step = SummarizerStep::new(store.clone(), Arc::new(FailingModel));
        let payload = step.run(7).await.unwrap();
        assert_eq!(payload["generation_success"], false);
        assert!(payload["error"]
            .as_str()
            .unwrap()
            .contains("unreachable"));

        // The degraded output is still persisted
        let stored: SummarizerOutput = store.read_output(7, NAME).unwrap().unwrap();
        assert!(!stored.generation_success);
    }

    #[tokio::test]
    async fn test_missing_ingestion_fails() {
        let store = Arc::new(ReviewStore::open_in_memory().unwrap());
        let step = SummarizerStep::new(store, Arc::new(CannedModel));
        assert!(matches!(
            step.run(7).await.unwrap_err(),
            StepError::MissingDependency { .. }
        ));
    }
}
