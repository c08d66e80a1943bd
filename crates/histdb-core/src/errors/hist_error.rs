use chrono::{DateTime, Utc};

use super::error_code::{self, HistErrorCode};
use super::{IngestError, StorageError, TemporalError};

/// Top-level error type for histdb.
/// All subsystem errors convert into this via `From` impls.
#[derive(Debug, thiserror::Error)]
pub enum HistError {
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("temporal error: {0}")]
    TemporalError(#[from] TemporalError),

    #[error("ingest error: {0}")]
    IngestError(#[from] IngestError),

    /// A source item is not newer than the latest item already applied to the table.
    #[error(
        "ordering violation on {table}: {locator} at {source_time} is not after latest recorded {latest}"
    )]
    OrderingViolation {
        table: String,
        locator: String,
        source_time: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    #[error("validation failure: {0}")]
    ValidationFailure(String),

    #[error("table not found: {name}")]
    TableNotFound { name: String },

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl HistError {
    /// Transient failures are retried by the coordinator; everything else aborts the run.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StorageError(e) => e.is_retryable(),
            Self::IngestError(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl HistErrorCode for HistError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::StorageError(e) => e.error_code(),
            Self::TemporalError(e) => e.error_code(),
            Self::IngestError(e) => e.error_code(),
            Self::OrderingViolation { .. } => error_code::ORDERING_VIOLATION,
            Self::ValidationFailure(_) => error_code::VALIDATION_FAILURE,
            Self::TableNotFound { .. } => error_code::TABLE_NOT_FOUND,
            Self::ConfigError(_) => error_code::CONFIG_ERROR,
            Self::SerializationError(_) => error_code::SERIALIZATION_ERROR,
        }
    }
}

/// Convenience type alias.
pub type HistResult<T> = Result<T, HistError>;
