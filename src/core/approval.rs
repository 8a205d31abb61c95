//! Approval polling against the PR comment stream.
//!
//! A gate blocks its run until an operator posts the expected command,
//! the decision was already recorded, or the poll budget runs out.
//! Polling (instead of a webhook) keeps the gate free of any inbound
//! networking, so the whole pipeline can run inside a short-lived batch
//! invocation; the cost is latency bounded by `interval * max_attempts`
//! and a full comment-list fetch per attempt.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::adapters::CodeHost;
use crate::config::PollConfig;
use crate::core::ReviewStore;
use crate::domain::IssueComment;
use crate::error::{StepError, StoreError};

/// Reserved decider identity used when the poll budget expires.
pub const SYSTEM_DECIDER: &str = "system";

/// Fixed comment recorded on timeout.
pub const TIMEOUT_COMMENT: &str = "Approval timeout";

/// Directive markers an operator's comment must carry to decide a gate.
pub const APPROVE_MARKER: &str = "/approve-step";
pub const REJECT_MARKER: &str = "/reject-step";

/// Polls the comment stream for an operator decision and records it.
pub struct ApprovalGate {
    store: Arc<ReviewStore>,
    code_host: Arc<dyn CodeHost>,
    poll: PollConfig,
}

impl ApprovalGate {
    pub fn new(store: Arc<ReviewStore>, code_host: Arc<dyn CodeHost>, poll: PollConfig) -> Self {
        Self {
            store,
            code_host,
            poll,
        }
    }

    /// Resolve one approval step to approved (true) or rejected (false).
    ///
    /// A decision already in the store short-circuits the poll entirely,
    /// which is what makes the gate resumable after a process restart.
    /// Timeout records a rejection under the reserved system identity;
    /// downstream it is indistinguishable from a human "no".
    pub async fn wait_for_decision(
        &self,
        pr_number: u64,
        approval_step: u8,
        expected_token: &str,
    ) -> Result<bool, StepError> {
        if let Some(record) = self.store.read_approval(pr_number, approval_step)? {
            info!(
                approval_step,
                approved = record.approved,
                decider = %record.decider,
                "approval already recorded; skipping poll"
            );
            return Ok(record.approved);
        }

        info!(
            approval_step,
            token = expected_token,
            max_attempts = self.poll.max_attempts,
            "waiting for operator decision"
        );

        for attempt in 1..=self.poll.max_attempts {
            let comments = self
                .code_host
                .comments(pr_number)
                .await
                .map_err(StepError::CodeHost)?;

            if let Some(approved) =
                self.scan_comments(&comments, expected_token, pr_number, approval_step)?
            {
                return Ok(approved);
            }

            debug!(
                attempt,
                max_attempts = self.poll.max_attempts,
                "no qualifying comment yet"
            );

            if attempt < self.poll.max_attempts {
                tokio::time::sleep(self.poll.interval).await;
            }
        }

        warn!(approval_step, "poll budget exhausted; recording rejection");
        self.store
            .write_approval(pr_number, approval_step, false, SYSTEM_DECIDER, TIMEOUT_COMMENT)?;
        Ok(false)
    }

    /// Scan the full comment list newest-first for a deciding command.
    ///
    /// The first comment containing the expected token wins, provided it
    /// also carries a directive marker. A token match without a marker is
    /// skipped and the scan continues to older comments.
    fn scan_comments(
        &self,
        comments: &[IssueComment],
        expected_token: &str,
        pr_number: u64,
        approval_step: u8,
    ) -> Result<Option<bool>, StoreError> {
        let token = expected_token.trim().to_lowercase();

        for comment in comments.iter().rev() {
            let body = comment.body.trim().to_lowercase();
            if !body.contains(&token) {
                continue;
            }

            if body.contains(APPROVE_MARKER) {
                info!(approval_step, decider = %comment.author, "gate approved");
                self.store.write_approval(
                    pr_number,
                    approval_step,
                    true,
                    &comment.author,
                    &comment.body,
                )?;
                return Ok(Some(true));
            }

            if body.contains(REJECT_MARKER) {
                info!(approval_step, decider = %comment.author, "gate rejected");
                self.store.write_approval(
                    pr_number,
                    approval_step,
                    false,
                    &comment.author,
                    &comment.body,
                )?;
                return Ok(Some(false));
            }

            // Token without a directive: malformed command, keep scanning.
        }

        Ok(None)
    }
}
