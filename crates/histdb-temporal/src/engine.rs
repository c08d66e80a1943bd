//! TemporalEngine: snapshot application and history queries over a shared `StorageEngine`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use histdb_core::models::{DeltaPolicy, Row, RowKey, TableSchema, UpsertCounts, VersionedRow};
use histdb_core::HistResult;
use histdb_storage::StorageEngine;

use crate::{query, upsert};

/// Writes go through the storage writer in one transaction per call;
/// queries go through the read pool.
#[derive(Clone)]
pub struct TemporalEngine {
    storage: Arc<StorageEngine>,
}

impl TemporalEngine {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    /// Apply a snapshot to a catalogued table in its own transaction.
    pub fn apply(
        &self,
        table: &str,
        rows: Vec<Row>,
        effective: DateTime<Utc>,
        policy: &DeltaPolicy,
    ) -> HistResult<UpsertCounts> {
        let schema = self.storage.table_schema(table)?;
        self.apply_with_schema(&schema, rows, effective, policy)
    }

    /// Apply a snapshot with an explicit schema in its own transaction.
    pub fn apply_with_schema(
        &self,
        schema: &TableSchema,
        rows: Vec<Row>,
        effective: DateTime<Utc>,
        policy: &DeltaPolicy,
    ) -> HistResult<UpsertCounts> {
        self.storage
            .in_transaction(|tx| upsert::apply(tx, schema, rows, effective, policy))
    }

    pub fn current_rows(&self, table: &str) -> HistResult<Vec<VersionedRow>> {
        let schema = self.storage.table_schema(table)?;
        self.storage
            .with_reader(|conn| query::current_rows(conn, &schema))
    }

    /// Closed versions with `valid_to <= as_of`, ordered by key then `valid_from`.
    pub fn history_until(&self, table: &str, as_of: DateTime<Utc>) -> HistResult<Vec<VersionedRow>> {
        let schema = self.storage.table_schema(table)?;
        self.storage
            .with_reader(|conn| query::history_until(conn, &schema, as_of))
    }

    pub fn as_of(&self, table: &str, t: DateTime<Utc>) -> HistResult<Vec<VersionedRow>> {
        let schema = self.storage.table_schema(table)?;
        self.storage.with_reader(|conn| query::as_of(conn, &schema, t))
    }

    pub fn key_versions(&self, table: &str, key: &RowKey) -> HistResult<Vec<VersionedRow>> {
        let schema = self.storage.table_schema(table)?;
        self.storage
            .with_reader(|conn| query::key_versions(conn, &schema, key))
    }

    /// Every version of every key in `table`, current included.
    pub fn all_versions(&self, table: &str) -> HistResult<Vec<VersionedRow>> {
        let schema = self.storage.table_schema(table)?;
        self.storage.with_reader(|conn| {
            let mut all = query::history_until(conn, &schema, histdb_core::time::sentinel_max())?;
            all.extend(query::current_rows(conn, &schema)?);
            Ok(all)
        })
    }

    /// `check_interval_integrity` over the whole table.
    pub fn verify(&self, table: &str) -> HistResult<()> {
        query::check_interval_integrity(&self.all_versions(table)?)
    }
}
