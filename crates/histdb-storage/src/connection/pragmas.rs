//! PRAGMAs applied to every connection immediately after opening.

use rusqlite::Connection;

use histdb_core::HistResult;

use crate::to_storage_err;

/// Writer PRAGMAs: WAL, NORMAL sync, foreign keys, busy timeout.
pub fn apply_pragmas(conn: &Connection, busy_timeout_ms: u64) -> HistResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = {busy_timeout_ms};
        PRAGMA temp_store = MEMORY;
        "
    ))
    .map_err(to_storage_err)
}

/// Reader PRAGMAs: busy timeout plus `query_only`.
pub fn apply_read_pragmas(conn: &Connection, busy_timeout_ms: u64) -> HistResult<()> {
    conn.execute_batch(&format!(
        "
        PRAGMA busy_timeout = {busy_timeout_ms};
        PRAGMA query_only = ON;
        "
    ))
    .map_err(to_storage_err)
}
