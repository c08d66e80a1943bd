pub mod error_code;
mod hist_error;
mod ingest_error;
mod storage_error;
mod temporal_error;

pub use error_code::HistErrorCode;
pub use hist_error::{HistError, HistResult};
pub use ingest_error::IngestError;
pub use storage_error::StorageError;
pub use temporal_error::TemporalError;
