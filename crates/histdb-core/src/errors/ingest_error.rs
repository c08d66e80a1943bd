//! Errors raised while pulling from sources and driving a dataset run.

use super::error_code::{self, HistErrorCode};
use super::HistError;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Source I/O failure (file read, broker connection). Retryable.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("cannot decode {locator}: {reason}")]
    SourceDecode { locator: String, reason: String },

    /// The post-commit callback failed (e.g. acknowledgement). Retryable.
    #[error("commit callback failed for {locator}: {reason}")]
    CommitFailed { locator: String, reason: String },

    #[error("transform {name} failed: {reason}")]
    TransformFailed { name: String, reason: String },

    #[error("producer channel closed")]
    ChannelClosed,

    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: Box<HistError> },

    #[error("dataset {dataset} failed: {reason}")]
    DatasetFailed { dataset: String, reason: String },
}

impl IngestError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_) | Self::CommitFailed { .. } | Self::ChannelClosed
        )
    }
}

impl HistErrorCode for IngestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => error_code::SOURCE_UNAVAILABLE,
            Self::SourceDecode { .. } => error_code::SOURCE_DECODE,
            Self::CommitFailed { .. } => error_code::COMMIT_FAILED,
            Self::RetriesExhausted { .. } => error_code::RETRIES_EXHAUSTED,
            _ => error_code::INGEST_ERROR,
        }
    }
}
