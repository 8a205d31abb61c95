//! SQLite-backed store for step outputs, approval decisions, and halts.
//!
//! The store is the single source of truth: steps and the engine hold no
//! state across calls, and a re-invoked pipeline reads everything it
//! needs back out of here. All writes are keyed upserts (INSERT OR
//! REPLACE), so re-running a step replaces its previous output instead
//! of appending. Each call is one implicit transaction; cross-run
//! concurrency is safe because runs never touch each other's keys.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::domain::{ApprovalRecord, HaltRecord};
use crate::error::StoreError;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS step_outputs (
  pr_number INTEGER NOT NULL,
  step_name TEXT NOT NULL,
  payload TEXT NOT NULL,
  created_at TEXT NOT NULL,
  PRIMARY KEY (pr_number, step_name)
);

CREATE TABLE IF NOT EXISTS approvals (
  pr_number INTEGER NOT NULL,
  approval_step INTEGER NOT NULL,
  approved INTEGER NOT NULL CHECK (approved IN (0, 1)),
  decider TEXT NOT NULL,
  comment TEXT NOT NULL,
  created_at TEXT NOT NULL,
  PRIMARY KEY (pr_number, approval_step)
);

CREATE TABLE IF NOT EXISTS halted (
  pr_number INTEGER NOT NULL PRIMARY KEY,
  step_name TEXT NOT NULL,
  reason TEXT NOT NULL,
  created_at TEXT NOT NULL
);
";

/// Durable keyed storage for everything the pipeline persists.
pub struct ReviewStore {
    conn: Mutex<Connection>,
}

impl ReviewStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            // Connection::open fails with a bare "unable to open" without this
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Upsert a step's output. Overwrites any existing row for the key;
    /// the second write wins.
    pub fn write_output<T: Serialize>(
        &self,
        pr_number: u64,
        step_name: &str,
        payload: &T,
    ) -> Result<Value, StoreError> {
        let value = serde_json::to_value(payload)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO step_outputs (pr_number, step_name, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                pr_number,
                step_name,
                value.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(value)
    }

    /// Read a step's output, deserialized into the caller's type.
    /// Absent is `Ok(None)`: a step that has not run yet is an expected
    /// state, not an error.
    pub fn read_output<T: DeserializeOwned>(
        &self,
        pr_number: u64,
        step_name: &str,
    ) -> Result<Option<T>, StoreError> {
        match self.read_output_value(pr_number, step_name)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Read a step's output as raw JSON.
    pub fn read_output_value(
        &self,
        pr_number: u64,
        step_name: &str,
    ) -> Result<Option<Value>, StoreError> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT payload FROM step_outputs WHERE pr_number = ?1 AND step_name = ?2",
                params![pr_number, step_name],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// All outputs for a run, ordered by creation time. Diagnostic scan
    /// only; no step depends on this ordering.
    pub fn all_outputs(&self, pr_number: u64) -> Result<Vec<(String, Value)>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT step_name, payload FROM step_outputs
             WHERE pr_number = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![pr_number], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut outputs = Vec::new();
        for row in rows {
            let (step_name, text) = row?;
            outputs.push((step_name, serde_json::from_str(&text)?));
        }
        Ok(outputs)
    }

    /// Upsert an approval decision for one gate.
    pub fn write_approval(
        &self,
        pr_number: u64,
        approval_step: u8,
        approved: bool,
        decider: &str,
        comment: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO approvals
             (pr_number, approval_step, approved, decider, comment, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pr_number,
                approval_step,
                approved,
                decider,
                comment,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Read the recorded decision for one gate, if any.
    pub fn read_approval(
        &self,
        pr_number: u64,
        approval_step: u8,
    ) -> Result<Option<ApprovalRecord>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT approved, decider, comment, created_at FROM approvals
                 WHERE pr_number = ?1 AND approval_step = ?2",
                params![pr_number, approval_step],
                |row| {
                    Ok((
                        row.get::<_, bool>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((approved, decider, comment, created_at)) => Ok(Some(ApprovalRecord {
                pr_number,
                approval_step,
                approved,
                decider,
                comment,
                created_at: parse_timestamp(&created_at)?,
            })),
            None => Ok(None),
        }
    }

    /// Mark a run as halted. A later write replaces the record, but the
    /// run stays vetoed either way; there is no unhalt operation.
    pub fn set_halted(
        &self,
        pr_number: u64,
        step_name: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO halted (pr_number, step_name, reason, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![pr_number, step_name, reason, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Check the standing veto.
    pub fn is_halted(&self, pr_number: u64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM halted WHERE pr_number = ?1",
                params![pr_number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Read the halt record, if any.
    pub fn halt_record(&self, pr_number: u64) -> Result<Option<HaltRecord>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT step_name, reason, created_at FROM halted WHERE pr_number = ?1",
                params![pr_number],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((step_name, reason, created_at)) => Ok(Some(HaltRecord {
                pr_number,
                step_name,
                reason,
                created_at: parse_timestamp(&created_at)?,
            })),
            None => Ok(None),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> ReviewStore {
        ReviewStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_output_upsert_second_write_wins() {
        let store = store();

        store
            .write_output(7, "summarizer", &json!({"summary": "first"}))
            .unwrap();
        store
            .write_output(7, "summarizer", &json!({"summary": "second"}))
            .unwrap();

        let outputs = store.all_outputs(7).unwrap();
        assert_eq!(outputs.len(), 1, "upsert must leave exactly one row");

        let payload: Value = store.read_output(7, "summarizer").unwrap().unwrap();
        assert_eq!(payload["summary"], "second");
    }

    #[test]
    fn test_absent_output_is_none() {
        let store = store();
        let missing: Option<Value> = store.read_output(7, "ingestion").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_outputs_partitioned_by_run() {
        let store = store();
        store.write_output(1, "ingestion", &json!({"pr": 1})).unwrap();
        store.write_output(2, "ingestion", &json!({"pr": 2})).unwrap();

        let one: Value = store.read_output(1, "ingestion").unwrap().unwrap();
        assert_eq!(one["pr"], 1);
        assert_eq!(store.all_outputs(2).unwrap().len(), 1);
    }

    #[test]
    fn test_approval_roundtrip_and_upsert() {
        let store = store();
        assert!(store.read_approval(7, 3).unwrap().is_none());

        store
            .write_approval(7, 3, true, "alice", "/approve-step 3 lgtm")
            .unwrap();
        let record = store.read_approval(7, 3).unwrap().unwrap();
        assert!(record.approved);
        assert_eq!(record.decider, "alice");

        store
            .write_approval(7, 3, false, "bob", "/reject-step 3")
            .unwrap();
        let record = store.read_approval(7, 3).unwrap().unwrap();
        assert!(!record.approved);
        assert_eq!(record.decider, "bob");
    }

    #[test]
    fn test_halt_record() {
        let store = store();
        assert!(!store.is_halted(7).unwrap());

        store.set_halted(7, "approval_gate_1", "step 3 rejected").unwrap();
        assert!(store.is_halted(7).unwrap());

        let record = store.halt_record(7).unwrap().unwrap();
        assert_eq!(record.step_name, "approval_gate_1");
        assert_eq!(record.reason, "step 3 rejected");

        // Replace-not-append: a second halt leaves one row
        store.set_halted(7, "approval_gate_2", "step 8 rejected").unwrap();
        let record = store.halt_record(7).unwrap().unwrap();
        assert_eq!(record.step_name, "approval_gate_2");
    }
}
