//! Early policy step: cheap deterministic checks before anyone spends
//! review time or LLM tokens on the PR.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::ingestion::{self, IngestionOutput};
use super::Step;
use crate::core::ReviewStore;
use crate::error::StepError;

pub const NAME: &str = "early_policy";

const ACCEPTED_BASE_BRANCHES: &[&str] = &["main", "master", "develop"];
const MIN_DESCRIPTION_CHARS: usize = 10;
const CHANGES_ISSUE_THRESHOLD: u64 = 1000;
const CHANGES_WARNING_THRESHOLD: u64 = 500;
const MAX_FILES: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyPolicyOutput {
    pub issues_found: Vec<String>,
    pub warnings: Vec<String>,
    pub total_changes: u64,
    pub num_files: usize,
    pub has_description: bool,
    pub base_branch_approved: bool,
}

pub struct EarlyPolicyStep {
    store: Arc<ReviewStore>,
}

impl EarlyPolicyStep {
    pub fn new(store: Arc<ReviewStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Step for EarlyPolicyStep {
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

        let output = evaluate(&pr);
        info!(
            pr_number,
            issues = output.issues_found.len(),
            warnings = output.warnings.len(),
            "early policy evaluated"
        );
        Ok(self.store.write_output(pr_number, NAME, &output)?)
    }
}

fn evaluate(pr: &IngestionOutput) -> EarlyPolicyOutput {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let description = pr.description.trim();
    let has_description = description.chars().count() >= MIN_DESCRIPTION_CHARS;
    if !has_description {
        issues.push("PR description is missing or too short".to_string());
    }

    let base_branch_approved = ACCEPTED_BASE_BRANCHES.contains(&pr.base_branch.as_str());
    if !base_branch_approved {
        warnings.push(format!("Unconventional base branch: {}", pr.base_branch));
    }

    let total_changes: u64 = pr.changed_files.iter().map(|f| f.changes).sum();
    if total_changes > CHANGES_ISSUE_THRESHOLD {
        issues.push(format!(
            "PR is too large ({} changes). Consider breaking it down.",
            total_changes
        ));
    } else if total_changes > CHANGES_WARNING_THRESHOLD {
        warnings.push(format!(
            "Large PR ({} changes). Review may take longer.",
            total_changes
        ));
    }

    let num_files = pr.changed_files.len();
    if num_files > MAX_FILES {
        issues.push(format!(
            "Too many files changed ({}). Consider smaller scope.",
            num_files
        ));
    }

    EarlyPolicyOutput {
        issues_found: issues,
        warnings,
        total_changes,
        num_files,
        has_description,
        base_branch_approved,
    }
}
