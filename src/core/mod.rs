//! Orchestration core: store, approval gate, and pipeline engine.

pub mod approval;
pub mod engine;
pub mod store;

pub use approval::{ApprovalGate, APPROVE_MARKER, REJECT_MARKER, SYSTEM_DECIDER, TIMEOUT_COMMENT};
pub use engine::PipelineEngine;
pub use store::ReviewStore;
