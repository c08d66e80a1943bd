//! # histdb-storage
//!
//! SQLite persistence layer for histdb.
//! Single write connection + read pool (WAL mode), forward-only migrations,
//! the audit ledger, and explicit current/history tables per dataset.

pub mod audit;
pub mod connection;
pub mod engine;
pub mod migrations;
pub mod queries;

use histdb_core::errors::StorageError;
use histdb_core::HistError;
use rusqlite::ErrorCode;

pub use audit::AuditLedger;
pub use engine::StorageEngine;

/// Convert a rusqlite error into a `HistError`.
/// BUSY and LOCKED become the retryable `StorageError::Busy`.
pub fn to_storage_err(e: rusqlite::Error) -> HistError {
    let message = e.to_string();
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            StorageError::Busy { message }.into()
        }
        _ => StorageError::SqliteError { message }.into(),
    }
}
