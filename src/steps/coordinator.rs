//! Coordinator step: final aggregation once both gates have approved.
//!
//! Collects every analysis output, posts the assembled review back to
//! the PR conversation, and labels the PR so reviewers can filter on
//! pipeline results.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::ask::{self, AskOutput};
use super::deep_policy::{self, DeepPolicyOutput};
use super::ingestion::{self, IngestionOutput};
use super::reviewer::{self, ReviewerOutput};
use super::summarizer::{self, SummarizerOutput};
use super::Step;
use crate::adapters::CodeHost;
use crate::core::ReviewStore;
use crate::error::StepError;

pub const NAME: &str = "coordinator";

pub const REVIEWED_LABEL: &str = "prsentry-reviewed";
pub const VIOLATIONS_LABEL: &str = "policy-violations";
pub const DISCUSSION_LABEL: &str = "needs-discussion";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorOutput {
    pub comment_posted: bool,
    pub comment_length: usize,
    pub labels_added: Vec<String>,
    pub violations_count: usize,
    pub questions_count: usize,
}

pub struct CoordinatorStep {
    store: Arc<ReviewStore>,
    code_host: Arc<dyn CodeHost>,
}

impl CoordinatorStep {
    pub fn new(store: Arc<ReviewStore>, code_host: Arc<dyn CodeHost>) -> Self {
        Self { store, code_host }
    }

    fn require<T: serde::de::DeserializeOwned>(
        &self,
        pr_number: u64,
        dependency: &'static str,
    ) -> Result<T, StepError> {
        self.store
            .read_output(pr_number, dependency)?
            .ok_or(StepError::MissingDependency {
                step: NAME,
                dependency,
            })
    }
}

#[async_trait]
impl Step for CoordinatorStep {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(&self, pr_number: u64) -> Result<Value, StepError> {
        let pr: IngestionOutput = self.require(pr_number, ingestion::NAME)?;
        let summary: SummarizerOutput = self.require(pr_number, summarizer::NAME)?;
        let review: ReviewerOutput = self.require(pr_number, reviewer::NAME)?;
        let policy: DeepPolicyOutput = self.require(pr_number, deep_policy::NAME)?;
        let questions: AskOutput = self.require(pr_number, ask::NAME)?;

        let comment = build_comment(pr_number, &pr, &summary, &review, &policy, &questions);
        self.code_host
            .post_comment(pr_number, &comment)
            .await
            .map_err(StepError::CodeHost)?;

        let mut labels = vec![REVIEWED_LABEL.to_string()];
        if !policy.policy_violations.is_empty() {
            labels.push(VIOLATIONS_LABEL.to_string());
        }
        if questions.questions_count > 0 {
            labels.push(DISCUSSION_LABEL.to_string());
        }
        self.code_host
            .add_labels(pr_number, &labels)
            .await
            .map_err(StepError::CodeHost)?;

        info!(
            pr_number,
            labels = labels.len(),
            comment_length = comment.len(),
            "review posted"
        );

        let output = CoordinatorOutput {
            comment_posted: true,
            comment_length: comment.chars().count(),
            labels_added: labels,
            violations_count: policy.policy_violations.len(),
            questions_count: questions.questions_count,
        };
        Ok(self.store.write_output(pr_number, NAME, &output)?)
    }
}

fn build_comment(
    pr_number: u64,
    pr: &IngestionOutput,
    summary: &SummarizerOutput,
    review: &ReviewerOutput,
    policy: &DeepPolicyOutput,
    questions: &AskOutput,
) -> String {
    let mut comment = format!(
        "## Automated review for PR #{}: {}\n\n### Summary\n{}\n\n### Review findings\n{}\n\n### Policy violations\n",
        pr_number, pr.title, summary.summary, review.review_findings
    );

    if policy.policy_violations.is_empty() {
        comment.push_str("None found.\n");
    } else {
        for violation in &policy.policy_violations {
            comment.push_str(&format!("- {}\n", violation));
        }
    }

    comment.push_str("\n### Clarifying questions\n");
    if questions.clarifying_questions.is_empty() {
        comment.push_str("None.\n");
    } else {
        for question in &questions.clarifying_questions {
            let bullet = question.trim_start_matches('-').trim();
            comment.push_str(&format!("- {}\n", bullet));
        }
    }

    comment
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixtures() -> (
        IngestionOutput,
        SummarizerOutput,
        ReviewerOutput,
        DeepPolicyOutput,
        AskOutput,
    ) {
        (
            IngestionOutput {
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
            },
            SummarizerOutput {
                summary: "Adds a widget.".to_string(),
                summary_length: 14,
                files_analyzed: 1,
                generation_success: true,
                error: None,
            },
            ReviewerOutput {
                review_findings: "No critical issues.".to_string(),
                files_reviewed: 1,
                review_success: true,
                review_categories: vec![],
                error: None,
            },
            DeepPolicyOutput {
                policy_violations: vec!["Missing test file for: src/widget.rs".to_string()],
                standards_met: vec![],
                llm_analysis: String::new(),
                files_checked: 1,
                analysis_success: true,
                error: None,
            },
            AskOutput {
                clarifying_questions: vec!["- Why a new module?".to_string()],
                questions_count: 1,
                generation_success: true,
                error: None,
            },
        )
    }

    #[test]
    fn test_comment_contains_all_sections() {
        let (pr, summary, review, policy, questions) = fixtures();
        let comment = build_comment(42, &pr, &summary, &review, &policy, &questions);

        assert!(comment.contains("Automated review for PR #42: Add widget"));
        assert!(comment.contains("Adds a widget."));
        assert!(comment.contains("No critical issues."));
        assert!(comment.contains("- Missing test file for: src/widget.rs"));
        assert!(comment.contains("- Why a new module?"));
    }

    #[test]
    fn test_empty_sections_say_so() {
        let (pr, summary, review, mut policy, mut questions) = fixtures();
        policy.policy_violations.clear();
        questions.clarifying_questions.clear();
        questions.questions_count = 0;

        let comment = build_comment(42, &pr, &summary, &review, &policy, &questions);
        assert!(comment.contains("None found."));
        assert!(comment.contains("None.\n"));
    }
}
