//! Error taxonomy for the orchestration core.
//!
//! Steps distinguish three failure classes: a missing upstream output
//! (fatal for the run), a failed code-host call (fatal, never caught in
//! the core), and a store failure. Language-model failures are not part
//! of this taxonomy: the calling step catches them and writes a degraded
//! output instead of failing the run.

use thiserror::Error;

/// Errors a step can surface to the engine. Any of these ends the run
/// in the `Failed` state; earlier step outputs are not rolled back.
#[derive(Debug, Error)]
pub enum StepError {
    /// A required upstream output has not been written yet.
    #[error("step '{step}' requires output from '{dependency}' which is absent")]
    MissingDependency {
        step: &'static str,
        dependency: &'static str,
    },

    /// A code-host call failed. Not retried by the core.
    #[error("code host call failed: {0}")]
    CodeHost(#[source] anyhow::Error),

    /// The review store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from the SQLite-backed review store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("invalid timestamp in store: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("store mutex poisoned")]
    Poisoned,
}
