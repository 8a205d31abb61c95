//! Persisted decision records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded human (or timeout) decision for one approval gate.
///
/// At most one per (pr_number, approval_step); once written it is
/// authoritative and the gate never polls for that step again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub pr_number: u64,
    pub approval_step: u8,
    pub approved: bool,
    /// Comment author, or the reserved "system" identity on timeout
    pub decider: String,
    /// Raw body of the deciding comment, or the fixed timeout marker
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// A standing veto for a run. At most one per pr_number; stays in place
/// until an operator clears it outside the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltRecord {
    pub pr_number: u64,
    /// Step that halted the run (or "manual" for an operator veto)
    pub step_name: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
