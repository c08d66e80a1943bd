//! Read-side queries over a versioned table pair.

pub mod integrity;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use histdb_core::models::{RowKey, TableSchema, VersionedRow};
use histdb_core::HistResult;
use histdb_storage::queries::versioned_ops::{self, VersionFilter, VersionSet};

pub use integrity::check_interval_integrity;

fn sort_versions(versions: &mut [VersionedRow]) {
    versions.sort_by(|a, b| a.key.cmp(&b.key).then(a.valid_from.cmp(&b.valid_from)));
}

/// The current view, ordered by key.
pub fn current_rows(conn: &Connection, schema: &TableSchema) -> HistResult<Vec<VersionedRow>> {
    let mut rows =
        versioned_ops::select_versions(conn, schema, VersionSet::Current, &VersionFilter::All)?;
    sort_versions(&mut rows);
    Ok(rows)
}

/// Closed versions whose `valid_to <= as_of`, ordered by key then `valid_from`.
pub fn history_until(
    conn: &Connection,
    schema: &TableSchema,
    as_of: DateTime<Utc>,
) -> HistResult<Vec<VersionedRow>> {
    let mut rows = versioned_ops::select_versions(
        conn,
        schema,
        VersionSet::History,
        &VersionFilter::EndedBy(as_of),
    )?;
    sort_versions(&mut rows);
    Ok(rows)
}

/// The version of every key in force at `t`, ordered by key.
pub fn as_of(
    conn: &Connection,
    schema: &TableSchema,
    t: DateTime<Utc>,
) -> HistResult<Vec<VersionedRow>> {
    let filter = VersionFilter::ValidAt(t);
    let mut rows = versioned_ops::select_versions(conn, schema, VersionSet::History, &filter)?;
    rows.extend(versioned_ops::select_versions(
        conn,
        schema,
        VersionSet::Current,
        &filter,
    )?);
    sort_versions(&mut rows);
    Ok(rows)
}

/// Every version of `key`, oldest first.
pub fn key_versions(
    conn: &Connection,
    schema: &TableSchema,
    key: &RowKey,
) -> HistResult<Vec<VersionedRow>> {
    let filter = VersionFilter::Key(key.clone());
    let mut rows = versioned_ops::select_versions(conn, schema, VersionSet::History, &filter)?;
    rows.extend(versioned_ops::select_versions(
        conn,
        schema,
        VersionSet::Current,
        &filter,
    )?);
    sort_versions(&mut rows);
    Ok(rows)
}
