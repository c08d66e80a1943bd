//! v001: schema_version and the audit ledger.

use rusqlite::Connection;

use histdb_core::HistResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> HistResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );

        CREATE TABLE IF NOT EXISTS __audit_log (
            audit_id    INTEGER PRIMARY KEY AUTOINCREMENT,
            table_name  TEXT NOT NULL CHECK (length(table_name) <= 64),
            source_kind TEXT NOT NULL CHECK (length(source_kind) <= 32),
            locator     TEXT NOT NULL CHECK (length(locator) <= 1023),
            source_time TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            UNIQUE (table_name, source_kind, locator, source_time)
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_table_time
            ON __audit_log (table_name, source_time);
        CREATE INDEX IF NOT EXISTS idx_audit_log_table_locator
            ON __audit_log (table_name, locator);
        ",
    )
    .map_err(to_storage_err)
}
