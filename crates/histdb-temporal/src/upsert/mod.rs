//! Snapshot-diff upsert.
//!
//! Reconciles an incoming row-set against the current rows of a table:
//! new keys are inserted, changed keys have their current version closed into
//! history and replaced, unchanged keys are left alone, and (with dropoff
//! finality) keys missing from the snapshot are closed without replacement.
//! Everything runs on the caller's connection so it shares the caller's
//! transaction or savepoint.

pub mod classify;
pub mod dedupe;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use histdb_core::errors::TemporalError;
use histdb_core::models::{DeltaPolicy, Row, RowKey, TableSchema, UpsertCounts, VersionedRow};
use histdb_core::time::truncate_micros;
use histdb_core::HistResult;
use histdb_storage::queries::versioned_ops::{self, VersionFilter, VersionSet};

pub use classify::UpsertPlan;

/// Apply `rows` as the state of `schema`'s table at `effective`.
///
/// Re-applying the same rows at the same or a later time is a no-op.
/// An effective time earlier than a key's current `valid_from`, or earlier
/// than the end of a re-inserted key's last closed version, fails with
/// `TemporalOrderViolation` before anything is written.
pub fn apply(
    conn: &Connection,
    schema: &TableSchema,
    rows: Vec<Row>,
    effective: DateTime<Utc>,
    policy: &DeltaPolicy,
) -> HistResult<UpsertCounts> {
    let effective = truncate_micros(effective);
    let received = rows.len();
    let mut rows = schema.conform(rows)?;
    if policy.drop_unchanged_rows {
        rows = dedupe::drop_unchanged_rows(schema, rows)?;
    }
    let incoming = dedupe::unique_by_key(schema, rows, policy.unique_strategy)?;
    debug!(
        table = %schema.name,
        received,
        unique = incoming.len(),
        "deduplicated incoming rows"
    );

    let current: BTreeMap<RowKey, VersionedRow> =
        versioned_ops::select_versions(conn, schema, VersionSet::Current, &VersionFilter::All)?
            .into_iter()
            .map(|v| (v.key.clone(), v))
            .collect();

    let plan = classify::plan(schema, incoming, current, policy.row_finality);
    check_order(conn, schema, &plan, effective)?;
    let counts = write_plan(conn, schema, plan, effective)?;

    info!(
        table = %schema.name,
        effective = %effective,
        inserted = counts.inserted,
        updated = counts.updated,
        deleted = counts.deleted,
        unchanged = counts.unchanged,
        "snapshot applied"
    );
    Ok(counts)
}

fn violation(
    schema: &TableSchema,
    key: &RowKey,
    effective: DateTime<Utc>,
    boundary: DateTime<Utc>,
) -> TemporalError {
    TemporalError::TemporalOrderViolation {
        table: schema.name.clone(),
        key: key.to_string(),
        effective,
        boundary,
    }
}

fn check_order(
    conn: &Connection,
    schema: &TableSchema,
    plan: &UpsertPlan,
    effective: DateTime<Utc>,
) -> HistResult<()> {
    let closing = plan.updates.iter().map(|(_, cur)| cur).chain(&plan.deletes);
    for cur in closing {
        if effective < cur.valid_from {
            return Err(violation(schema, &cur.key, effective, cur.valid_from).into());
        }
    }
    for (key, _) in &plan.inserts {
        if let Some(end) = versioned_ops::latest_history_end(conn, schema, key)? {
            if effective < end {
                return Err(violation(schema, key, effective, end).into());
            }
        }
    }
    Ok(())
}

fn close(conn: &Connection, schema: &TableSchema, cur: VersionedRow, at: DateTime<Utc>) -> HistResult<()> {
    // A version opened at `at` has no extent to keep.
    if cur.valid_from == at {
        return Ok(());
    }
    versioned_ops::insert_history(
        conn,
        schema,
        &VersionedRow {
            valid_to: at,
            ..cur
        },
    )
}

fn write_plan(
    conn: &Connection,
    schema: &TableSchema,
    plan: UpsertPlan,
    effective: DateTime<Utc>,
) -> HistResult<UpsertCounts> {
    let mut counts = UpsertCounts {
        unchanged: plan.unchanged,
        ..UpsertCounts::default()
    };

    for (_, row) in &plan.inserts {
        versioned_ops::insert_current(conn, schema, row, effective)?;
        counts.inserted += 1;
    }
    for (row, cur) in plan.updates {
        close(conn, schema, cur, effective)?;
        versioned_ops::update_current(conn, schema, &row, effective)?;
        counts.updated += 1;
    }
    for cur in plan.deletes {
        let key = cur.key.clone();
        close(conn, schema, cur, effective)?;
        versioned_ops::delete_current(conn, schema, &key)?;
        counts.deleted += 1;
    }
    Ok(counts)
}
