//! Pull-request data as the core consumes it.
//!
//! These are the narrow shapes the collaborator adapters map the code
//! host's wire format into. Nothing here knows about GitHub specifically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PR metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrDetails {
    pub title: String,
    pub description: String,
    pub author: String,
    pub base_branch: String,
    pub head_branch: String,
    pub head_sha: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One file touched by a PR
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    /// Unified diff hunk; empty for binary files
    pub patch: String,
}

/// A conversation comment on a PR, in chronological order as the host
/// returns them. The approval gate re-derives newest-first by reversing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
