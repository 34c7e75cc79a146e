//! Append-only run ledger (`ops.pipeline_runs`).
//!
//! Exactly one row per orchestration invocation, written in FINALIZE on both
//! the success and failure paths. Records are immutable once written and
//! ordered by `run_ts` (RFC 3339, so lexical order is chronological).

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::Serialize;
use tracing::info;

use crate::error::PipelineError;
use crate::store::{Access, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(RunStatus::Success),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// Persisted outcome of one pipeline invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub run_ts: DateTime<Utc>,
    pub status: RunStatus,
    pub regenerated_raw: bool,
    /// Comma-joined names of the model scripts that completed, in order.
    pub models_ran: String,
    pub duration_seconds: f64,
    pub error_message: Option<String>,
}

/// Idempotent creation of the ledger table. Runs before any timing starts;
/// if this fails there is nowhere to write a record, so the failure is fatal
/// to the whole invocation.
pub fn ensure_ops_ledger(store: &Store) -> Result<(), PipelineError> {
    let conn = store.open(Access::ReadWrite)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ops.pipeline_runs (
            run_id TEXT NOT NULL,
            run_ts TEXT NOT NULL,
            status TEXT NOT NULL,
            regenerated_raw INTEGER NOT NULL,
            models_ran TEXT NOT NULL,
            duration_seconds REAL NOT NULL,
            error_message TEXT
        )",
        [],
    )?;
    Ok(())
}

/// Append one record. Never fails silently: an error here propagates out of
/// the whole invocation since there is no fallback ledger.
pub fn append_run(store: &Store, record: &RunRecord) -> Result<(), PipelineError> {
    let conn = store.open(Access::ReadWrite)?;
    conn.execute(
        "INSERT INTO ops.pipeline_runs
         (run_id, run_ts, status, regenerated_raw, models_ran, duration_seconds, error_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.run_id,
            record.run_ts.to_rfc3339(),
            record.status.as_str(),
            record.regenerated_raw,
            record.models_ran,
            record.duration_seconds,
            record.error_message,
        ],
    )?;
    info!(
        run_id = %record.run_id,
        status = record.status.as_str(),
        duration_s = record.duration_seconds,
        "run recorded"
    );
    Ok(())
}

/// Most recent runs, newest first.
pub fn recent_runs(store: &Store, limit: usize) -> Result<Vec<RunRecord>, PipelineError> {
    let conn = store.open(Access::ReadOnly)?;
    let mut stmt = conn.prepare(
        "SELECT run_id, run_ts, status, regenerated_raw, models_ran, duration_seconds, error_message
         FROM ops.pipeline_runs
         ORDER BY run_ts DESC
         LIMIT ?1",
    )?;
    let records = stmt
        .query_map([limit], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Latest run record, if any run has been logged.
pub fn latest_run(store: &Store) -> Result<Option<RunRecord>, PipelineError> {
    Ok(recent_runs(store, 1)?.into_iter().next())
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<RunRecord> {
    let run_ts_raw: String = row.get(1)?;
    let run_ts = DateTime::parse_from_rfc3339(&run_ts_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let status_raw: String = row.get(2)?;
    let status = RunStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown run status `{status_raw}`").into(),
        )
    })?;
    Ok(RunRecord {
        run_id: row.get(0)?,
        run_ts,
        status,
        regenerated_raw: row.get(3)?,
        models_ran: row.get(4)?,
        duration_seconds: row.get(5)?,
        error_message: row.get(6)?,
    })
}
