//! End-to-End Pipeline Tests
//!
//! Runs the real nine-step sequence against in-process collaborator
//! fakes: a code host whose comment stream approves both gates, and a
//! language model that either answers or always fails.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use prsentry::adapters::{CodeHost, LanguageModel};
use prsentry::config::PollConfig;
use prsentry::core::{PipelineEngine, ReviewStore};
use prsentry::domain::{ChangedFile, IssueComment, PipelineStatus, PrDetails};

struct FakeHost {
    comments: Vec<IssueComment>,
    comment_fetches: AtomicUsize,
    posted: Mutex<Vec<String>>,
    labels: Mutex<Vec<String>>,
}

impl FakeHost {
    fn approving() -> Self {
        let at = |minute| Utc.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap();
        Self {
            comments: vec![
                IssueComment {
                    author: "alice".to_string(),
                    body: "/approve-step 3 early checks look fine".to_string(),
                    created_at: at(0),
                },
                IssueComment {
                    author: "alice".to_string(),
                    body: "/approve-step 8 ship it".to_string(),
                    created_at: at(5),
                },
            ],
            comment_fetches: AtomicUsize::new(0),
            posted: Mutex::new(Vec::new()),
            labels: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CodeHost for FakeHost {
    async fn pr_details(&self, _pr_number: u64) -> Result<PrDetails> {
        Ok(PrDetails {
            title: "Add widget".to_string(),
            description: "Adds the widget module and wires it up.".to_string(),
            author: "octocat".to_string(),
            base_branch: "main".to_string(),
            head_branch: "feature/widget".to_string(),
            head_sha: "abc123".to_string(),
            state: "open".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        })
    }

    async fn changed_files(&self, _pr_number: u64) -> Result<Vec<ChangedFile>> {
        Ok(vec![ChangedFile {
            filename: "src/widget.rs".to_string(),
            status: "added".to_string(),
            additions: 40,
            deletions: 0,
            changes: 40,
            patch: "@@ -0,0 +1,40 @@\n+pub struct Widget;".to_string(),
        }])
    }

    async fn file_content(&self, _path: &str, _git_ref: &str) -> Result<Option<String>> {
        Ok(Some("pub struct Widget;\n".to_string()))
    }

    async fn comments(&self, _pr_number: u64) -> Result<Vec<IssueComment>> {
        self.comment_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.comments.clone())
    }

    async fn post_comment(&self, _pr_number: u64, body: &str) -> Result<()> {
        self.posted.lock().unwrap().push(body.to_string());
        Ok(())
    }

    async fn add_labels(&self, _pr_number: u64, labels: &[String]) -> Result<()> {
        self.labels.lock().unwrap().extend(labels.iter().cloned());
        Ok(())
    }
}

struct FakeModel {
    fail: bool,
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if self.fail {
            anyhow::bail!("model endpoint unreachable");
        }
        if prompt.contains("clarifying questions") {
            Ok("- Why a new module?\n- Is the API stable?".to_string())
        } else if prompt.contains("engineering standards") {
            Ok("The change is well organized and documented.".to_string())
        } else {
            Ok("This PR introduces a widget module.".to_string())
        }
    }
}

fn poll() -> PollConfig {
    PollConfig {
        max_attempts: 2,
        interval: Duration::from_millis(0),
    }
}

fn engine(store: Arc<ReviewStore>, host: Arc<FakeHost>, fail_llm: bool) -> PipelineEngine {
    PipelineEngine::new(store, host, Arc::new(FakeModel { fail: fail_llm }), poll())
}

#[tokio::test]
async fn test_full_pipeline_completes() {
    let store = Arc::new(ReviewStore::open_in_memory().unwrap());
    let host = Arc::new(FakeHost::approving());

    let outcome = engine(store.clone(), host.clone(), false).run(42).await.unwrap();
    assert_eq!(outcome.status, PipelineStatus::Completed);

    // Every non-gate step persisted exactly one output
    let outputs = store.all_outputs(42).unwrap();
    let names: Vec<&str> = outputs.iter().map(|(n, _)| n.as_str()).collect();
    for expected in [
        "ingestion",
        "early_policy",
        "summarizer",
        "reviewer",
        "deep_policy",
        "ask",
        "coordinator",
    ] {
        assert!(names.contains(&expected), "missing output for {}", expected);
    }

    // Both gates recorded their decisions
    assert!(store.read_approval(42, 3).unwrap().unwrap().approved);
    assert!(store.read_approval(42, 8).unwrap().unwrap().approved);

    // The coordinator posted the assembled review and labeled the PR
    let posted = host.posted.lock().unwrap();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].contains("Automated review for PR #42"));
    assert!(posted[0].contains("This PR introduces a widget module."));

    let labels = host.labels.lock().unwrap();
    assert!(labels.iter().any(|l| l == "prsentry-reviewed"));
    // One source file and no test file in the change set
    assert!(labels.iter().any(|l| l == "policy-violations"));
    assert!(labels.iter().any(|l| l == "needs-discussion"));
}

#[tokio::test]
async fn test_degraded_llm_is_non_fatal() {
    let store = Arc::new(ReviewStore::open_in_memory().unwrap());
    let host = Arc::new(FakeHost::approving());

    let outcome = engine(store.clone(), host.clone(), true).run(42).await.unwrap();
    assert_eq!(outcome.status, PipelineStatus::Completed);

    let summary: Value = store.read_output(42, "summarizer").unwrap().unwrap();
    assert_eq!(summary["generation_success"], false);
    assert!(summary["error"].as_str().unwrap().contains("unreachable"));

    let review: Value = store.read_output(42, "reviewer").unwrap().unwrap();
    assert_eq!(review["review_success"], false);

    // The coordinator still posts, carrying the degraded sections
    let posted = host.posted.lock().unwrap();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].contains("Failed to generate summary"));
}

#[tokio::test]
async fn test_rerun_replaces_outputs_and_skips_gate_polls() {
    let store = Arc::new(ReviewStore::open_in_memory().unwrap());
    let host = Arc::new(FakeHost::approving());
    let engine = engine(store.clone(), host.clone(), false);

    assert_eq!(
        engine.run(42).await.unwrap().status,
        PipelineStatus::Completed
    );
    let fetches_first = host.comment_fetches.load(Ordering::SeqCst);
    assert_eq!(fetches_first, 2, "one poll per gate on the first run");

    // Re-invoking the pipeline recomputes steps but resolves both gates
    // from their recorded decisions
    assert_eq!(
        engine.run(42).await.unwrap().status,
        PipelineStatus::Completed
    );
    assert_eq!(host.comment_fetches.load(Ordering::SeqCst), fetches_first);

    // Still exactly one output row per step
    let outputs = store.all_outputs(42).unwrap();
    assert_eq!(outputs.len(), 7);

    // The coordinator posted twice (steps recompute; posting is a step
    // side effect, not deduplicated)
    assert_eq!(host.posted.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_gate_rejection_short_circuits_real_steps() {
    let store = Arc::new(ReviewStore::open_in_memory().unwrap());
    let mut host = FakeHost::approving();
    host.comments[0].body = "/reject-step 3 split this PR".to_string();
    let host = Arc::new(host);

    let outcome = engine(store.clone(), host.clone(), false).run(42).await.unwrap();
    assert_eq!(outcome.status, PipelineStatus::Halted);
    assert_eq!(outcome.halted_at.unwrap().step_index, Some(2));

    // Analysis steps never ran, nothing was posted
    assert!(store
        .read_output::<Value>(42, "summarizer")
        .unwrap()
        .is_none());
    assert!(host.posted.lock().unwrap().is_empty());

    // And the halt stands on the next invocation
    let outcome = engine(store.clone(), host, false).run(42).await.unwrap();
    assert_eq!(outcome.status, PipelineStatus::Halted);
}
