//! Pipeline engine: executes the fixed step sequence for one run.
//!
//! The engine owns no state of its own; everything it decides on comes
//! from the store. A vetoed run is skipped before any step executes, a
//! rejecting gate stops the sequence where it stands, and a step error
//! ends the run as Failed without rolling back earlier outputs.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::adapters::{CodeHost, LanguageModel};
use crate::config::PollConfig;
use crate::core::ReviewStore;
use crate::domain::{HaltPoint, RunOutcome};
use crate::error::StoreError;
use crate::steps::{standard_steps, Step};

/// Executes the nine-step review sequence for one PR at a time.
pub struct PipelineEngine {
    store: Arc<ReviewStore>,
    steps: Vec<Box<dyn Step>>,
}

impl PipelineEngine {
    /// Engine with the standard nine-step review sequence.
    pub fn new(
        store: Arc<ReviewStore>,
        code_host: Arc<dyn CodeHost>,
        llm: Arc<dyn LanguageModel>,
        poll: PollConfig,
    ) -> Self {
        let steps = standard_steps(store.clone(), code_host, llm, poll);
        Self { store, steps }
    }

    /// Engine over an arbitrary step sequence (tests).
    pub fn with_steps(store: Arc<ReviewStore>, steps: Vec<Box<dyn Step>>) -> Self {
        Self { store, steps }
    }

    /// Names of the configured steps, in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline for one PR.
    ///
    /// Returns `Err` only when the store itself is unusable; every step
    /// failure is folded into the returned outcome instead.
    #[instrument(skip(self), fields(pr = pr_number))]
    pub async fn run(&self, pr_number: u64) -> Result<RunOutcome, StoreError> {
        info!("starting review pipeline");

        // Standing veto: a halted run executes nothing until an operator
        // clears the record outside the pipeline.
        if let Some(record) = self.store.halt_record(pr_number)? {
            warn!(
                step = %record.step_name,
                reason = %record.reason,
                "run is halted; skipping"
            );
            let step_index = self
                .steps
                .iter()
                .position(|s| s.name() == record.step_name);
            return Ok(RunOutcome::halted(
                pr_number,
                Some(HaltPoint {
                    step_index,
                    step_name: record.step_name,
                    reason: record.reason,
                }),
            ));
        }

        for (index, step) in self.steps.iter().enumerate() {
            info!(step = step.name(), index, "running step");

            let payload = match step.run(pr_number).await {
                Ok(payload) => payload,
                Err(e) => {
                    error!(step = step.name(), error = %e, "step failed; run failed");
                    return Ok(RunOutcome::failed(pr_number, e.to_string()));
                }
            };

            // A gate that resolved to rejection has already written the
            // halt record; the engine only stops the sequence.
            if step.is_gate() && !gate_approved(&payload) {
                warn!(step = step.name(), index, "gate rejected; halting run");
                let reason = self
                    .store
                    .halt_record(pr_number)?
                    .map(|r| r.reason)
                    .unwrap_or_else(|| "gate rejected".to_string());
                return Ok(RunOutcome::halted(
                    pr_number,
                    Some(HaltPoint {
                        step_index: Some(index),
                        step_name: step.name().to_string(),
                        reason,
                    }),
                ));
            }
        }

        info!("review pipeline completed");
        Ok(RunOutcome::completed(pr_number))
    }
}

fn gate_approved(payload: &Value) -> bool {
    payload
        .get("approved")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_approved_reads_payload() {
        assert!(gate_approved(&serde_json::json!({"approved": true})));
        assert!(!gate_approved(&serde_json::json!({"approved": false})));
        assert!(!gate_approved(&serde_json::json!({})));
    }
}
