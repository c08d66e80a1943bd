//! Table catalog: persisted `TableSchema` per versioned table.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use histdb_core::models::TableSchema;
use histdb_core::time::format_ts;
use histdb_core::HistResult;

use crate::to_storage_err;

pub fn upsert_schema(conn: &Connection, schema: &TableSchema) -> HistResult<()> {
    let json = serde_json::to_string(schema)?;
    let now = format_ts(&Utc::now());
    conn.execute(
        "INSERT INTO __table_catalog (table_name, schema_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(table_name) DO UPDATE SET
             schema_json = excluded.schema_json,
             updated_at = excluded.updated_at",
        params![schema.name, json, now],
    )
    .map_err(to_storage_err)?;
    Ok(())
}

pub fn get_schema(conn: &Connection, name: &str) -> HistResult<Option<TableSchema>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT schema_json FROM __table_catalog WHERE table_name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(to_storage_err)?;
    match json {
        Some(j) => Ok(Some(serde_json::from_str(&j)?)),
        None => Ok(None),
    }
}

pub fn list_tables(conn: &Connection) -> HistResult<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT table_name FROM __table_catalog ORDER BY table_name")
        .map_err(to_storage_err)?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(to_storage_err)?;
    rows.collect::<Result<Vec<String>, _>>().map_err(to_storage_err)
}

pub fn delete_schema(conn: &Connection, name: &str) -> HistResult<bool> {
    let n = conn
        .execute("DELETE FROM __table_catalog WHERE table_name = ?1", params![name])
        .map_err(to_storage_err)?;
    Ok(n > 0)
}
