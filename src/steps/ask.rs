//! Ask step: clarifying questions for the PR author, generated from the
//! accumulated analysis.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::deep_policy::{self, DeepPolicyOutput};
use super::ingestion::{self, IngestionOutput};
use super::reviewer::{self, ReviewerOutput};
use super::Step;
use crate::adapters::LanguageModel;
use crate::core::ReviewStore;
use crate::error::StepError;

pub const NAME: &str = "ask";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskOutput {
    pub clarifying_questions: Vec<String>,
    pub questions_count: usize,
    pub generation_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct AskStep {
    store: Arc<ReviewStore>,
    llm: Arc<dyn LanguageModel>,
}

impl AskStep {
    pub fn new(store: Arc<ReviewStore>, llm: Arc<dyn LanguageModel>) -> Self {
        Self { store, llm }
    }
}

#[async_trait]
impl Step for AskStep {
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

        let review: Option<ReviewerOutput> = self.store.read_output(pr_number, reviewer::NAME)?;
        let policy: Option<DeepPolicyOutput> =
            self.store.read_output(pr_number, deep_policy::NAME)?;

        let prompt = build_prompt(&pr, review.as_ref(), policy.as_ref());

        let output = match self.llm.complete(&prompt).await {
            Ok(text) => {
                let questions = parse_questions(&text);
                info!(pr_number, count = questions.len(), "questions generated");
                AskOutput {
                    questions_count: questions.len(),
                    clarifying_questions: questions,
                    generation_success: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(pr_number, error = %e, "question generation failed; storing degraded output");
                AskOutput {
                    clarifying_questions: vec![format!("Failed to generate questions: {}", e)],
                    questions_count: 0,
                    generation_success: false,
                    error: Some(e.to_string()),
                }
            }
        };

        Ok(self.store.write_output(pr_number, NAME, &output)?)
    }
}

/// Question-shaped lines: bullets, or anything carrying a question mark.
/// A response with no such lines is kept whole rather than dropped.
fn parse_questions(text: &str) -> Vec<String> {
    let questions: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && (line.starts_with('-') || line.contains('?')))
        .map(str::to_string)
        .collect();

    if questions.is_empty() {
        vec![text.trim().to_string()]
    } else {
        questions
    }
}

fn build_prompt(
    pr: &IngestionOutput,
    review: Option<&ReviewerOutput>,
    policy: Option<&DeepPolicyOutput>,
) -> String {
    let review_findings = review
        .map(|r| r.review_findings.as_str())
        .unwrap_or("N/A");
    let violations = policy
        .map(|p| format!("{:?}", p.policy_violations))
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "Based on this pull request analysis, generate 3-5 clarifying questions for the author:\n\
         \n\
         PR Title: {}\n\
         PR Description: {}\n\
         \n\
         Code Review Findings: {}\n\
         Policy Violations: {}\n\
         \n\
         Generate thoughtful, technical questions that would help clarify:\n\
         1. Implementation decisions\n\
         2. Design choices\n\
         3. Edge cases\n\
         4. Future considerations\n\
         5. Any ambiguous parts of the code\n\
         \n\
         Format each question clearly and professionally.",
        pr.title, pr.description, review_findings, violations
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bullets_and_question_marks() {
        let text = "Here are some questions.\n- Why a new module?\nDoes this handle unicode?\nplain statement";
        let questions = parse_questions(text);
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0], "- Why a new module?");
        assert_eq!(questions[1], "Does this handle unicode?");
    }

    #[test]
    fn test_unparseable_response_kept_whole() {
        let text = "No questions at all.";
        let questions = parse_questions(text);
        assert_eq!(questions, vec!["No questions at all.".to_string()]);
    }
}
