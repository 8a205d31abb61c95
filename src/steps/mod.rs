//! The nine pipeline steps.
//!
//! Each step is a pure function of its own code, the current store
//! contents for the run, and collaborator responses. Steps always
//! recompute: re-running one replaces its stored output, which is what
//! makes the whole pipeline safe to re-invoke after an interruption.

pub mod ask;
pub mod coordinator;
pub mod deep_policy;
pub mod early_policy;
pub mod gate;
pub mod ingestion;
pub mod reviewer;
pub mod summarizer;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapters::{CodeHost, LanguageModel};
use crate::config::PollConfig;
use crate::core::ReviewStore;
use crate::error::StepError;

pub use ask::AskStep;
pub use coordinator::CoordinatorStep;
pub use deep_policy::DeepPolicyStep;
pub use early_policy::EarlyPolicyStep;
pub use gate::ApprovalGateStep;
pub use ingestion::IngestionStep;
pub use reviewer::ReviewerStep;
pub use summarizer::SummarizerStep;

/// One pipeline stage with a single responsibility and one persisted
/// output. `run` is safe to re-invoke: at-least-once semantics, with a
/// later output replacing the earlier one.
#[async_trait]
pub trait Step: Send + Sync {
    /// Step name, also the storage key for its output
    fn name(&self) -> &'static str;

    /// Gates resolve an `approved` field the engine acts on
    fn is_gate(&self) -> bool {
        false
    }

    /// Execute the step for one run and return its payload.
    async fn run(&self, pr_number: u64) -> Result<Value, StepError>;
}

/// The fixed review sequence. Gates sit after the early policy check and
/// after all analysis steps; the coordinator only runs when both
/// approved.
pub fn standard_steps(
    store: Arc<ReviewStore>,
    code_host: Arc<dyn CodeHost>,
    llm: Arc<dyn LanguageModel>,
    poll: PollConfig,
) -> Vec<Box<dyn Step>> {
    vec![
        Box::new(IngestionStep::new(store.clone(), code_host.clone())),
        Box::new(EarlyPolicyStep::new(store.clone())),
        Box::new(ApprovalGateStep::first(
            store.clone(),
            code_host.clone(),
            poll.clone(),
        )),
        Box::new(SummarizerStep::new(store.clone(), llm.clone())),
        Box::new(ReviewerStep::new(store.clone(), llm.clone())),
        Box::new(DeepPolicyStep::new(store.clone(), llm.clone())),
        Box::new(AskStep::new(store.clone(), llm)),
        Box::new(ApprovalGateStep::second(store.clone(), code_host.clone(), poll)),
        Box::new(CoordinatorStep::new(store, code_host)),
    ]
}

/// Character-safe prefix truncation for oversized patches.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}
