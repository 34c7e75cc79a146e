//! Pipeline error taxonomy.
//!
//! Components return typed errors; the orchestrator catches them exactly
//! once at its boundary and persists `category: message` plus the source
//! chain into the run record.

use std::path::PathBuf;

use thiserror::Error;

use crate::validate::DqReport;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A model script could not be resolved on disk. Detected before any
    /// mutation for that script; aborts the remaining sequence.
    #[error("missing model script `{name}`: {}", .path.display())]
    MissingModelScript { name: String, path: PathBuf },

    /// A model script's SQL failed to execute.
    #[error("model script `{name}` failed")]
    Model {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The external raw-data generator failed.
    #[error("raw data generator failed: {message}")]
    Generator { message: String },

    /// The DQ battery verdict was false; carries the full check battery.
    #[error("data-quality battery failed: {}", .report.summary())]
    QualityGate { report: DqReport },

    /// A SQL identifier that cannot be safely interpolated.
    #[error("invalid SQL identifier `{0}`")]
    InvalidIdentifier(String),

    /// Uniqueness checks need at least one key column.
    #[error("uniqueness check requires at least one key column")]
    EmptyUniqueKey,

    #[error("storage error")]
    Storage(#[from] rusqlite::Error),

    #[error("store I/O error")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stable category name, the analogue of an exception type, used as the
    /// prefix of persisted error messages.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::MissingModelScript { .. } => "MissingModelScript",
            PipelineError::Model { .. } => "ModelExecution",
            PipelineError::Generator { .. } => "GeneratorFailure",
            PipelineError::QualityGate { .. } => "QualityGateFailure",
            PipelineError::InvalidIdentifier(_) => "InvalidIdentifier",
            PipelineError::EmptyUniqueKey => "EmptyUniqueKey",
            PipelineError::Storage(_) => "StorageError",
            PipelineError::Io(_) => "IoError",
        }
    }

    /// Structured error string persisted to the run ledger: category,
    /// message, and the full source chain.
    pub fn render(&self) -> String {
        let mut out = format!("{}: {}", self.category(), self);
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str(&format!("\ncaused by: {cause}"));
            source = cause.source();
        }
        out
    }
}
