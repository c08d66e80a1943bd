//! DDL and row operations for a versioned table pair.
//!
//! `<table>` holds exactly one current row per key (`__valid_to` = sentinel);
//! `<table>__history` holds closed versions keyed by `(key, __valid_from)`.
//! Identifiers are validated by `TableSchema::validate` before interpolation.

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};

use histdb_core::constants::{SENTINEL_MAX_STR, VALID_FROM_COL, VALID_TO_COL};
use histdb_core::errors::StorageError;
use histdb_core::models::{Row, RowKey, TableSchema, VersionedRow};
use histdb_core::time::{format_ts, parse_ts, sentinel_max};
use histdb_core::{HistError, HistResult};

use crate::to_storage_err;

use super::value_codec::{from_sql, to_sql};

/// Which physical table a version query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSet {
    Current,
    History,
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

fn column_list(schema: &TableSchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| quote(&c.name))
        .chain([quote(VALID_FROM_COL), quote(VALID_TO_COL)])
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_list(schema: &TableSchema) -> String {
    schema
        .key_columns
        .iter()
        .map(|k| quote(k))
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_predicate(schema: &TableSchema, first_param: usize) -> String {
    schema
        .key_columns
        .iter()
        .enumerate()
        .map(|(i, k)| format!("{} = ?{}", quote(k), first_param + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn key_params(key: &RowKey) -> Vec<SqlValue> {
    key.0.iter().map(to_sql).collect()
}

fn physical_name(schema: &TableSchema, set: VersionSet) -> String {
    match set {
        VersionSet::Current => schema.name.clone(),
        VersionSet::History => schema.history_table(),
    }
}

/// Create the current and history tables if absent.
pub fn create_tables(conn: &Connection, schema: &TableSchema) -> HistResult<()> {
    schema.validate()?;
    let defs = schema
        .columns
        .iter()
        .map(|c| {
            let not_null = if !c.nullable || schema.is_key_column(&c.name) {
                " NOT NULL"
            } else {
                ""
            };
            format!("    {} {}{not_null}", quote(&c.name), c.column_type.sql_type())
        })
        .collect::<Vec<_>>()
        .join(",\n");
    let keys = key_list(schema);
    let current = quote(&schema.name);
    let history = quote(&schema.history_table());
    let from = quote(VALID_FROM_COL);
    let to = quote(VALID_TO_COL);

    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS {current} (
        {defs},
            {from} TEXT NOT NULL,
            {to} TEXT NOT NULL DEFAULT '{SENTINEL_MAX_STR}',
            PRIMARY KEY ({keys})
        );

        CREATE TABLE IF NOT EXISTS {history} (
        {defs},
            {from} TEXT NOT NULL,
            {to} TEXT NOT NULL,
            PRIMARY KEY ({keys}, {from}),
            CHECK ({from} < {to})
        );

        CREATE INDEX IF NOT EXISTS {idx} ON {history} ({to});
        ",
        idx = quote(&format!("idx_{}_valid_to", schema.history_table())),
    ))
    .map_err(to_storage_err)
}

/// Drop both tables of `name`.
pub fn drop_tables(conn: &Connection, name: &str, history_name: &str) -> HistResult<()> {
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {};",
        quote(history_name),
        quote(name)
    ))
    .map_err(to_storage_err)
}

pub fn table_exists(conn: &Connection, name: &str) -> HistResult<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
        .and_then(|mut stmt| stmt.exists(params![name]))
        .map_err(to_storage_err)
}

/// Insert a new current row.
pub fn insert_current(
    conn: &Connection,
    schema: &TableSchema,
    row: &Row,
    valid_from: DateTime<Utc>,
) -> HistResult<()> {
    let version = VersionedRow {
        key: schema.key_of(row)?,
        columns: row.clone(),
        valid_from,
        valid_to: sentinel_max(),
    };
    insert_version(conn, schema, VersionSet::Current, &version)
}

/// Append a closed version to history.
pub fn insert_history(
    conn: &Connection,
    schema: &TableSchema,
    version: &VersionedRow,
) -> HistResult<()> {
    insert_version(conn, schema, VersionSet::History, version)
}

fn insert_version(
    conn: &Connection,
    schema: &TableSchema,
    set: VersionSet,
    version: &VersionedRow,
) -> HistResult<()> {
    let placeholders = (1..=schema.columns.len() + 2)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote(&physical_name(schema, set)),
        column_list(schema),
    );

    let mut values = Vec::with_capacity(schema.columns.len() + 2);
    for col in &schema.columns {
        let value = match schema.key_columns.iter().position(|k| k == &col.name) {
            Some(i) => version.key.0.get(i),
            None => version.columns.get(&col.name),
        };
        values.push(value.map(to_sql).unwrap_or(SqlValue::Null));
    }
    values.push(SqlValue::Text(format_ts(&version.valid_from)));
    values.push(SqlValue::Text(format_ts(&version.valid_to)));

    conn.prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
        .map_err(to_storage_err)?;
    Ok(())
}

/// Overwrite the value columns and `__valid_from` of the current row of `row`'s key.
pub fn update_current(
    conn: &Connection,
    schema: &TableSchema,
    row: &Row,
    valid_from: DateTime<Utc>,
) -> HistResult<()> {
    let key = schema.key_of(row)?;
    let value_cols: Vec<&str> = schema.value_columns().map(|c| c.name.as_str()).collect();

    let mut assignments: Vec<String> = value_cols
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", quote(c), i + 1))
        .collect();
    assignments.push(format!("{} = ?{}", quote(VALID_FROM_COL), value_cols.len() + 1));
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote(&schema.name),
        assignments.join(", "),
        key_predicate(schema, value_cols.len() + 2),
    );

    let mut values: Vec<SqlValue> = value_cols
        .iter()
        .map(|c| row.get(*c).map(to_sql).unwrap_or(SqlValue::Null))
        .collect();
    values.push(SqlValue::Text(format_ts(&valid_from)));
    values.extend(key_params(&key));

    let n = conn
        .prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
        .map_err(to_storage_err)?;
    if n != 1 {
        return Err(StorageError::CorruptRow {
            table: schema.name.clone(),
            details: format!("expected one current row for key {key}, updated {n}"),
        }
        .into());
    }
    Ok(())
}

/// Delete the current row of `key`.
pub fn delete_current(conn: &Connection, schema: &TableSchema, key: &RowKey) -> HistResult<()> {
    let sql = format!(
        "DELETE FROM {} WHERE {}",
        quote(&schema.name),
        key_predicate(schema, 1)
    );
    conn.prepare_cached(&sql)
        .and_then(|mut stmt| stmt.execute(params_from_iter(key_params(key))))
        .map_err(to_storage_err)?;
    Ok(())
}

/// Latest `__valid_to` among the closed versions of `key`.
pub fn latest_history_end(
    conn: &Connection,
    schema: &TableSchema,
    key: &RowKey,
) -> HistResult<Option<DateTime<Utc>>> {
    let sql = format!(
        "SELECT MAX({}) FROM {} WHERE {}",
        quote(VALID_TO_COL),
        quote(&schema.history_table()),
        key_predicate(schema, 1)
    );
    let raw: Option<String> = conn
        .prepare_cached(&sql)
        .and_then(|mut stmt| stmt.query_row(params_from_iter(key_params(key)), |r| r.get(0)))
        .map_err(to_storage_err)?;
    raw.map(|s| parse_column_ts(schema, &s)).transpose()
}

/// Filter applied by `select_versions`.
#[derive(Debug, Clone)]
pub enum VersionFilter {
    All,
    /// `__valid_to <= t`
    EndedBy(DateTime<Utc>),
    /// `__valid_from <= t < __valid_to`
    ValidAt(DateTime<Utc>),
    Key(RowKey),
}

/// Read versions from one table, ordered by key then `__valid_from`.
pub fn select_versions(
    conn: &Connection,
    schema: &TableSchema,
    set: VersionSet,
    filter: &VersionFilter,
) -> HistResult<Vec<VersionedRow>> {
    let from = quote(VALID_FROM_COL);
    let to = quote(VALID_TO_COL);
    let (predicate, values) = match filter {
        VersionFilter::All => ("1 = 1".to_string(), Vec::new()),
        VersionFilter::EndedBy(t) => (
            format!("{to} <= ?1"),
            vec![SqlValue::Text(format_ts(t))],
        ),
        VersionFilter::ValidAt(t) => (
            format!("{from} <= ?1 AND {to} > ?1"),
            vec![SqlValue::Text(format_ts(t))],
        ),
        VersionFilter::Key(key) => (key_predicate(schema, 1), key_params(key)),
    };
    let sql = format!(
        "SELECT {} FROM {} WHERE {predicate} ORDER BY {}, {from}",
        column_list(schema),
        quote(&physical_name(schema, set)),
        key_list(schema),
    );

    let mut stmt = conn.prepare(&sql).map_err(to_storage_err)?;
    let mut rows = stmt.query(params_from_iter(values)).map_err(to_storage_err)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(to_storage_err)? {
        out.push(decode_version(schema, row)?);
    }
    Ok(out)
}

/// Number of rows in one table of the pair.
pub fn count_rows(conn: &Connection, schema: &TableSchema, set: VersionSet) -> HistResult<u64> {
    let n: i64 = conn
        .query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(&physical_name(schema, set))),
            [],
            |r| r.get(0),
        )
        .map_err(to_storage_err)?;
    Ok(n as u64)
}

fn decode_version(schema: &TableSchema, row: &rusqlite::Row<'_>) -> HistResult<VersionedRow> {
    let corrupt = |details: String| -> HistError {
        StorageError::CorruptRow {
            table: schema.name.clone(),
            details,
        }
        .into()
    };

    let mut columns = Row::new();
    for (i, col) in schema.columns.iter().enumerate() {
        let raw = row.get_ref(i).map_err(to_storage_err)?;
        let value = from_sql(raw, col.column_type)
            .map_err(|e| corrupt(format!("column '{}': {e}", col.name)))?;
        columns.insert(col.name.clone(), value);
    }
    let key = schema.key_of(&columns)?;
    for k in &schema.key_columns {
        columns.remove(k);
    }

    let n = schema.columns.len();
    let valid_from: String = row.get(n).map_err(to_storage_err)?;
    let valid_to: String = row.get(n + 1).map_err(to_storage_err)?;
    Ok(VersionedRow {
        key,
        columns,
        valid_from: parse_column_ts(schema, &valid_from)?,
        valid_to: parse_column_ts(schema, &valid_to)?,
    })
}

fn parse_column_ts(schema: &TableSchema, s: &str) -> HistResult<DateTime<Utc>> {
    parse_ts(s).ok_or_else(|| {
        StorageError::CorruptRow {
            table: schema.name.clone(),
            details: format!("unparseable interval bound '{s}'"),
        }
        .into()
    })
}
