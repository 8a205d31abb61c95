//! Approval gate steps: the two human decision points in the sequence.
//!
//! A gate resolves through [`ApprovalGate`] and, on rejection or
//! timeout, writes the halt record that vetoes the run. The durable
//! trace of a gate is its ApprovalRecord; gates do not write a step
//! output row.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::{early_policy, Step};
use crate::adapters::CodeHost;
use crate::config::PollConfig;
use crate::core::{ApprovalGate, ReviewStore};
use crate::error::StepError;

pub const FIRST_GATE_NAME: &str = "approval_gate_1";
pub const SECOND_GATE_NAME: &str = "approval_gate_2";

#[derive(Debug, Serialize)]
struct GateOutput {
    approved: bool,
    step: u8,
    pipeline_status: &'static str,
}

pub struct ApprovalGateStep {
    name: &'static str,
    /// Which of the two approval points this is (3 or 8)
    approval_step: u8,
    /// Token an operator's command must contain, e.g. "step 3"
    expected_token: String,
    /// Upstream output this gate refuses to run without
    requires: Option<&'static str>,
    gate: ApprovalGate,
    store: Arc<ReviewStore>,
}

impl ApprovalGateStep {
    /// Gate after the early policy check (approval step 3).
    pub fn first(
        store: Arc<ReviewStore>,
        code_host: Arc<dyn CodeHost>,
        poll: PollConfig,
    ) -> Self {
        Self::build(
            FIRST_GATE_NAME,
            3,
            Some(early_policy::NAME),
            store,
            code_host,
            poll,
        )
    }

    /// Gate before the coordinator (approval step 8).
    pub fn second(
        store: Arc<ReviewStore>,
        code_host: Arc<dyn CodeHost>,
        poll: PollConfig,
    ) -> Self {
        Self::build(SECOND_GATE_NAME, 8, None, store, code_host, poll)
    }

    fn build(
        name: &'static str,
        approval_step: u8,
        requires: Option<&'static str>,
        store: Arc<ReviewStore>,
        code_host: Arc<dyn CodeHost>,
        poll: PollConfig,
    ) -> Self {
        Self {
            name,
            approval_step,
            expected_token: format!("step {}", approval_step),
            requires,
            gate: ApprovalGate::new(store.clone(), code_host, poll),
            store,
        }
    }
}

#[async_trait]
impl Step for ApprovalGateStep {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_gate(&self) -> bool {
        true
    }

    async fn run(&self, pr_number: u64) -> Result<Value, StepError> {
        if let Some(dependency) = self.requires {
            if self
                .store
                .read_output_value(pr_number, dependency)?
                .is_none()
            {
                return Err(StepError::MissingDependency {
                    step: self.name,
                    dependency,
                });
            }
        }

        let approved = self
            .gate
            .wait_for_decision(pr_number, self.approval_step, &self.expected_token)
            .await?;

        if !approved {
            self.store.set_halted(
                pr_number,
                self.name,
                &format!("step {} rejected", self.approval_step),
            )?;
        }

        info!(
            pr_number,
            approval_step = self.approval_step,
            approved,
            "gate resolved"
        );

        let output = GateOutput {
            approved,
            step: self.approval_step,
            pipeline_status: if approved { "continuing" } else { "halted" },
        };
        Ok(serde_json::to_value(output).map_err(crate::error::StoreError::from)?)
    }
}
