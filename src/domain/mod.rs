//! Data structures shared across the pipeline.

pub mod outcome;
pub mod pr;
pub mod records;

pub use outcome::{HaltPoint, PipelineStatus, RunOutcome};
pub use pr::{ChangedFile, IssueComment, PrDetails};
pub use records::{ApprovalRecord, HaltRecord};
