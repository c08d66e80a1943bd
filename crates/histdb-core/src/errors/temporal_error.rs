/// Temporal subsystem errors.
#[derive(Debug, thiserror::Error)]
pub enum TemporalError {
    /// An upsert would place a version before the start of the key's latest interval.
    #[error(
        "temporal order violation on {table} key {key}: effective time {effective} precedes {boundary}"
    )]
    TemporalOrderViolation {
        table: String,
        key: String,
        effective: chrono::DateTime<chrono::Utc>,
        boundary: chrono::DateTime<chrono::Utc>,
    },

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("invalid bucket interval: {0}")]
    InvalidBucketInterval(String),

    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl super::HistErrorCode for TemporalError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::TemporalOrderViolation { .. } => super::error_code::TEMPORAL_ORDER_VIOLATION,
            _ => super::error_code::TEMPORAL_ERROR,
        }
    }
}
