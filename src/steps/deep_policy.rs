//! Deep policy step: engineering-standards checks.
//!
//! Deterministic heuristics (test presence, file naming) run first; an
//! LLM pass then extends the violation list. The LLM's free text is
//! classified with best-effort keyword rules; the pipeline only depends
//! on the structured result.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::ingestion::{self, IngestionOutput};
use super::reviewer::{self, ReviewerOutput};
use super::Step;
use crate::adapters::LanguageModel;
use crate::core::ReviewStore;
use crate::error::StepError;

pub const NAME: &str = "deep_policy";

const SOURCE_EXTENSIONS: &[&str] = &[".py", ".js", ".ts", ".java", ".cpp", ".c", ".go", ".rs"];
const TEST_PATTERNS: &[&str] = &["test_", "_test.", "spec.", "test/", "tests/"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepPolicyOutput {
    pub policy_violations: Vec<String>,
    pub standards_met: Vec<String>,
    pub llm_analysis: String,
    pub files_checked: usize,
    pub analysis_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct DeepPolicyStep {
    store: Arc<ReviewStore>,
    llm: Arc<dyn LanguageModel>,
}

impl DeepPolicyStep {
    pub fn new(store: Arc<ReviewStore>, llm: Arc<dyn LanguageModel>) -> Self {
        Self { store, llm }
    }
}

#[async_trait]
impl Step for DeepPolicyStep {
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

        // Advisory input; absent when the reviewer has not run
        let review: Option<ReviewerOutput> = self.store.read_output(pr_number, reviewer::NAME)?;

        let mut policy_violations = heuristic_violations(&pr);
        let standards_met = Vec::new();
        let files_checked = pr.changed_files.len();

        let prompt = build_prompt(&pr, review.as_ref());

        let output = match self.llm.complete(&prompt).await {
            Ok(analysis) => {
                policy_violations.extend(extract_violations(&analysis));
                info!(
                    pr_number,
                    violations = policy_violations.len(),
                    "deep policy analyzed"
                );
                DeepPolicyOutput {
                    policy_violations,
                    standards_met,
                    llm_analysis: analysis,
                    files_checked,
                    analysis_success: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(pr_number, error = %e, "policy analysis failed; storing degraded output");
                DeepPolicyOutput {
                    policy_violations,
                    standards_met,
                    llm_analysis: format!("Failed LLM analysis: {}", e),
                    files_checked,
                    analysis_success: false,
                    error: Some(e.to_string()),
                }
            }
        };

        Ok(self.store.write_output(pr_number, NAME, &output)?)
    }
}

fn heuristic_violations(pr: &IngestionOutput) -> Vec<String> {
    let mut violations = Vec::new();
    let has_test_change = pr
        .changed_files
        .iter()
        .any(|f| is_test_file(&f.filename));

    for file in &pr.changed_files {
        if is_source_file(&file.filename) && !is_test_file(&file.filename) && !has_test_change {
            violations.push(format!("Missing test file for: {}", file.filename));
        }
        if !follows_naming_convention(&file.filename) {
            violations.push(format!("Poor naming convention: {}", file.filename));
        }
    }
    violations
}

fn is_source_file(filename: &str) -> bool {
    SOURCE_EXTENSIONS.iter().any(|ext| filename.ends_with(ext))
}

fn is_test_file(filename: &str) -> bool {
    TEST_PATTERNS.iter().any(|p| filename.contains(p))
}

/// snake_case and kebab-case pass; bare CamelCase does not
fn follows_naming_convention(filename: &str) -> bool {
    if filename.contains('_') || filename.contains('-') {
        return true;
    }
    !filename
        .chars()
        .any(|c| c.is_alphabetic() && c.is_uppercase())
}

/// Pull violation-looking lines out of the free-text analysis.
fn extract_violations(analysis: &str) -> Vec<String> {
    let lowered = analysis.to_lowercase();
    if !lowered.contains("violation") && !lowered.contains("issue") {
        return Vec::new();
    }

    analysis
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn build_prompt(pr: &IngestionOutput, review: Option<&ReviewerOutput>) -> String {
    let filenames: Vec<&str> = pr
        .changed_files
        .iter()
        .map(|f| f.filename.as_str())
        .collect();
    let review_findings = review
        .map(|r| r.review_findings.as_str())
        .unwrap_or("N/A");

    format!(
        "Analyze this PR for compliance with software engineering standards:\n\
         \n\
         PR: {}\n\
         Files Changed: {:?}\n\
         \n\
         Review Findings: {}\n\
         \n\
         Check for:\n\
         1. Documentation standards (comments, README updates)\n\
         2. Code organization and structure\n\
         3. Security best practices\n\
         4. Test coverage expectations\n\
         5. Error handling patterns\n\
         6. Dependency management\n\
         7. Configuration changes\n\
         \n\
         List specific policy violations or compliance issues.",
        pr.title, filenames, review_findings
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_detection() {
        assert!(is_source_file("src/widget.rs"));
        assert!(is_source_file("app/main.py"));
        assert!(!is_source_file("README.md"));
        assert!(!is_source_file("Cargo.toml"));
    }

    #[test]
    fn test_test_file_detection() {
        assert!(is_test_file("tests/widget.rs"));
        assert!(is_test_file("test_widget.py"));
        assert!(is_test_file("widget_test.go"));
        assert!(!is_test_file("src/widget.rs"));
    }

    #[test]
    fn test_naming_convention() {
        assert!(follows_naming_convention("src/widget_factory.rs"));
        assert!(follows_naming_convention("docs/user-guide.md"));
        assert!(follows_naming_convention("src/widget.rs"));
        assert!(!follows_naming_convention("src/WidgetFactory.java"));
    }

    #[test]
    fn test_extract_violations_requires_keyword() {
        assert!(extract_violations("All checks passed. Nice work.").is_empty());

        let found = extract_violations("Issue: missing docs\n\n# heading\nViolation: no tests");
        assert_eq!(found, vec!["Issue: missing docs", "Violation: no tests"]);
    }
}
