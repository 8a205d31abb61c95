//! Reviewer step: LLM code review over the per-file patches.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::ingestion::{self, IngestionOutput};
use super::{truncate_chars, Step};
use crate::adapters::LanguageModel;
use crate::core::ReviewStore;
use crate::error::StepError;

pub const NAME: &str = "reviewer";

/// Per-file patch budget inside the prompt
const PROMPT_PATCH_CHAR_LIMIT: usize = 2_000;

const REVIEW_CATEGORIES: &[&str] = &["logic", "bugs", "smells", "performance", "security"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerOutput {
    pub review_findings: String,
    pub files_reviewed: usize,
    pub review_success: bool,
    pub review_categories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ReviewerStep {
    store: Arc<ReviewStore>,
    llm: Arc<dyn LanguageModel>,
}

impl ReviewerStep {
    pub fn new(store: Arc<ReviewStore>, llm: Arc<dyn LanguageModel>) -> Self {
        Self { store, llm }
    }
}

#[async_trait]
impl Step for ReviewerStep {
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

        let files_reviewed = pr.changed_files.len();
        let prompt = build_prompt(&pr);

        let output = match self.llm.complete(&prompt).await {
            Ok(review) => {
                info!(pr_number, files_reviewed, "review generated");
                ReviewerOutput {
                    review_findings: review,
                    files_reviewed,
                    review_success: true,
                    review_categories: REVIEW_CATEGORIES
                        .iter()
                        .map(|c| c.to_string())
                        .collect(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(pr_number, error = %e, "review generation failed; storing degraded output");
                ReviewerOutput {
                    review_findings: format!("Failed to generate review: {}", e),
                    files_reviewed,
                    review_success: false,
                    review_categories: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        };

        Ok(self.store.write_output(pr_number, NAME, &output)?)
    }
}

fn build_prompt(pr: &IngestionOutput) -> String {
    let mut code_context = String::new();
    for file in &pr.changed_files {
        code_context.push_str(&format!(
            "File: {}\nChanges:\n{}\n\n",
            file.filename,
            truncate_chars(&file.patch, PROMPT_PATCH_CHAR_LIMIT)
        ));
    }

    format!(
        "Perform a thorough code review for the following pull request:\n\
         \n\
         Title: {}\n\
         Description: {}\n\
         \n\
         Code Changes:\n\
         {}\n\
         Please analyze for:\n\
         1. Logic errors or bugs\n\
         2. Code smells and anti-patterns\n\
         3. Performance issues\n\
         4. Security vulnerabilities\n\
         5. Maintainability concerns\n\
         6. Edge cases not handled\n\
         \n\
         Provide specific, actionable feedback. Format your response as:\n\
         - **Critical Issues**: [list any critical problems]\n\
         - **Suggestions**: [list improvement suggestions]\n\
         - **Questions**: [any clarifying questions about the implementation]\n\
         \n\
         Be constructive and technical in your review.",
        pr.title, pr.description, code_context
    )
}
