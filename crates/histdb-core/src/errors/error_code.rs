//! Stable string codes attached to every error, for log correlation.

pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
pub const DB_BUSY: &str = "DB_BUSY";
pub const MIGRATION_FAILED: &str = "MIGRATION_FAILED";
pub const TABLE_NOT_FOUND: &str = "TABLE_NOT_FOUND";
pub const ORDERING_VIOLATION: &str = "ORDERING_VIOLATION";
pub const TEMPORAL_ORDER_VIOLATION: &str = "TEMPORAL_ORDER_VIOLATION";
pub const TEMPORAL_ERROR: &str = "TEMPORAL_ERROR";
pub const VALIDATION_FAILURE: &str = "VALIDATION_FAILURE";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
pub const SOURCE_UNAVAILABLE: &str = "SOURCE_UNAVAILABLE";
pub const SOURCE_DECODE: &str = "SOURCE_DECODE";
pub const COMMIT_FAILED: &str = "COMMIT_FAILED";
pub const RETRIES_EXHAUSTED: &str = "RETRIES_EXHAUSTED";
pub const INGEST_ERROR: &str = "INGEST_ERROR";

/// Implemented by every error type in the workspace.
pub trait HistErrorCode {
    fn error_code(&self) -> &'static str;
}
