use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer holds the store. Retryable by the caller after a backoff.
    #[error("store busy: another writer holds {path}")]
    StoreBusy { path: PathBuf },

    /// A handle could not be opened or restored. The instance cannot serve reads until restarted.
    #[error("store unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// A stored value could not be mapped back onto a record field.
    #[error("decode error in column {column}: {reason}")]
    Decode { column: &'static str, reason: String },

    /// Key derivation produced a conflicting row. Upserts make this unreachable on a healthy store.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("store opened as a reader; writes are not permitted")]
    WriteNotPermitted,

    #[error("series mismatch: expected {expected}, found {found}")]
    SeriesMismatch { expected: String, found: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("duckdb: {0}")]
    Engine(#[from] duckdb::Error),
}

impl StoreError {
    pub fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StoreError::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::StoreBusy { .. })
    }

    /// Map an engine error raised by a data statement (upsert, delete, summary update).
    pub(crate) fn from_statement(e: duckdb::Error) -> Self {
        if is_constraint_message(&e.to_string()) {
            StoreError::ConstraintViolation(e.to_string())
        } else {
            StoreError::Engine(e)
        }
    }
}

/// DuckDB reports file lock conflicts as IO errors; only the message distinguishes them.
pub(crate) fn is_lock_conflict_message(msg: &str) -> bool {
    msg.contains("Could not set lock") || msg.contains("Conflicting lock")
}

pub(crate) fn is_constraint_message(msg: &str) -> bool {
    msg.contains("Constraint Error")
        || msg.contains("violates primary key constraint")
        || msg.contains("Duplicate key")
}
