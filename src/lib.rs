//! prsentry - Human-in-the-loop PR review pipeline orchestrator
//!
//! Runs a fixed nine-step review pipeline for a pull request, persisting
//! every step's output to SQLite so a restarted run picks up recorded
//! approval decisions instead of re-polling humans.
//!
//! # Architecture
//!
//! - All cross-step communication goes through the [`core::ReviewStore`];
//!   steps hold no state between calls
//! - Two approval gates poll the PR comment stream for operator commands
//!   and treat timeout as rejection
//! - A halted run stays halted until an operator intervenes
//!
//! # Modules
//!
//! - `adapters`: External collaborators (GitHub REST, chat-completions LLM)
//! - `core`: Orchestration logic (ReviewStore, ApprovalGate, PipelineEngine)
//! - `steps`: The nine pipeline steps
//! - `domain`: Data structures (PR details, records, run outcome)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the review pipeline for a PR
//! prsentry run --pr-number 42
//!
//! # Inspect stored state for a PR
//! prsentry status --pr-number 42
//!
//! # Veto a run until someone clears it by hand
//! prsentry halt --pr-number 42 --reason "frozen for release week"
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod steps;

// Re-export main types at crate root for convenience
pub use crate::config::{Config, PollConfig};
pub use crate::core::{ApprovalGate, PipelineEngine, ReviewStore};
pub use crate::domain::{HaltPoint, PipelineStatus, RunOutcome};
pub use crate::error::{StepError, StoreError};
pub use crate::steps::Step;
