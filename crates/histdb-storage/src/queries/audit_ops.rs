//! Audit ledger insert, lookup, ordering and purge queries.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row as SqlRow};

use histdb_core::constants::{MAX_LOCATOR_LEN, MAX_TABLE_NAME_LEN};
use histdb_core::models::{AuditEntry, SourceItem, SourceKind};
use histdb_core::time::{format_ts, parse_ts};
use histdb_core::{HistError, HistResult};

use crate::to_storage_err;

const ENTRY_COLUMNS: &str =
    "audit_id, table_name, source_kind, locator, source_time, recorded_at";

/// Insert an entry. Returns `false` when the uniqueness constraint already holds it.
pub fn insert_entry(
    conn: &Connection,
    table: &str,
    item: &SourceItem,
    recorded_at: DateTime<Utc>,
) -> HistResult<bool> {
    if table.is_empty() || table.len() > MAX_TABLE_NAME_LEN {
        return Err(HistError::ValidationFailure(format!(
            "audit table name '{table}' must be 1..={MAX_TABLE_NAME_LEN} characters"
        )));
    }
    if item.locator.chars().count() > MAX_LOCATOR_LEN {
        return Err(HistError::ValidationFailure(format!(
            "locator exceeds {MAX_LOCATOR_LEN} characters: {}...",
            item.locator.chars().take(64).collect::<String>()
        )));
    }

    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO __audit_log
                 (table_name, source_kind, locator, source_time, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                table,
                item.kind.as_str(),
                item.locator,
                format_ts(&item.source_time),
                format_ts(&recorded_at),
            ],
        )
        .map_err(to_storage_err)?;
    Ok(inserted == 1)
}

/// Locators with no entry for `table` (any kind, any time), input order kept, duplicates removed.
pub fn filter_unprocessed(
    conn: &Connection,
    table: &str,
    locators: &[String],
) -> HistResult<Vec<String>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM __audit_log WHERE table_name = ?1 AND locator = ?2)",
        )
        .map_err(to_storage_err)?;

    let mut seen = BTreeSet::new();
    let mut remaining = Vec::new();
    for locator in locators {
        if !seen.insert(locator.as_str()) {
            continue;
        }
        let applied: bool = stmt
            .query_row(params![table, locator], |row| row.get(0))
            .map_err(to_storage_err)?;
        if !applied {
            remaining.push(locator.clone());
        }
    }
    Ok(remaining)
}

/// Entry of `kind` with the greatest `source_time` not after `as_of`.
pub fn latest_entry(
    conn: &Connection,
    table: &str,
    kind: SourceKind,
    as_of: Option<DateTime<Utc>>,
) -> HistResult<Option<AuditEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM __audit_log
         WHERE table_name = ?1 AND source_kind = ?2 AND (?3 IS NULL OR source_time <= ?3)
         ORDER BY source_time DESC, audit_id DESC
         LIMIT 1"
    );
    conn.query_row(
        &sql,
        params![table, kind.as_str(), as_of.map(|t| format_ts(&t))],
        row_to_entry,
    )
    .optional()
    .map_err(to_storage_err)
}

/// Greatest `source_time` recorded for `table` over all source kinds.
pub fn latest_source_time(conn: &Connection, table: &str) -> HistResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT MAX(source_time) FROM __audit_log WHERE table_name = ?1",
            params![table],
            |row| row.get(0),
        )
        .map_err(to_storage_err)?;
    raw.map(|s| parse_stored_ts(&s)).transpose()
}

/// All entries for `table`, oldest first.
pub fn entries(conn: &Connection, table: &str) -> HistResult<Vec<AuditEntry>> {
    let sql = format!(
        "SELECT {ENTRY_COLUMNS} FROM __audit_log
         WHERE table_name = ?1
         ORDER BY source_time ASC, audit_id ASC"
    );
    let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
    let rows = stmt
        .query_map(params![table], row_to_entry)
        .map_err(to_storage_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(to_storage_err)
}

/// Delete entries with `source_time < ts` (`<=` when inclusive).
pub fn purge_before(
    conn: &Connection,
    table: &str,
    ts: DateTime<Utc>,
    inclusive: bool,
) -> HistResult<u64> {
    let op = if inclusive { "<=" } else { "<" };
    delete_where(conn, table, op, ts)
}

/// Delete entries with `source_time > ts` (`>=` when inclusive).
pub fn purge_after(
    conn: &Connection,
    table: &str,
    ts: DateTime<Utc>,
    inclusive: bool,
) -> HistResult<u64> {
    let op = if inclusive { ">=" } else { ">" };
    delete_where(conn, table, op, ts)
}

/// Delete every entry for `table`.
pub fn purge_table(conn: &Connection, table: &str) -> HistResult<u64> {
    let n = conn
        .execute("DELETE FROM __audit_log WHERE table_name = ?1", params![table])
        .map_err(to_storage_err)?;
    Ok(n as u64)
}

fn delete_where(conn: &Connection, table: &str, op: &str, ts: DateTime<Utc>) -> HistResult<u64> {
    let sql = format!("DELETE FROM __audit_log WHERE table_name = ?1 AND source_time {op} ?2");
    let n = conn
        .execute(&sql, params![table, format_ts(&ts)])
        .map_err(to_storage_err)?;
    Ok(n as u64)
}

fn parse_stored_ts(s: &str) -> HistResult<DateTime<Utc>> {
    parse_ts(s).ok_or_else(|| {
        histdb_core::errors::StorageError::CorruptRow {
            table: histdb_core::constants::AUDIT_TABLE.to_string(),
            details: format!("unparseable timestamp '{s}'"),
        }
        .into()
    })
}

fn row_to_entry(row: &SqlRow<'_>) -> rusqlite::Result<AuditEntry> {
    let kind: String = row.get(2)?;
    let source_time: String = row.get(4)?;
    let recorded_at: String = row.get(5)?;
    Ok(AuditEntry {
        audit_id: row.get(0)?,
        table_name: row.get(1)?,
        source_kind: kind
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?,
        locator: row.get(3)?,
        source_time: ts_column(4, &source_time)?,
        recorded_at: ts_column(5, &recorded_at)?,
    })
}

fn ts_column(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    parse_ts(s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unparseable timestamp '{s}'").into(),
        )
    })
}
