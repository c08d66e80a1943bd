//! v002: catalog of versioned tables and their schemas.

use rusqlite::Connection;

use histdb_core::HistResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> HistResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS __table_catalog (
            table_name  TEXT PRIMARY KEY,
            schema_json TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        ",
    )
    .map_err(to_storage_err)
}
