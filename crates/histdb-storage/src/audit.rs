//! `AuditLedger`: the `IAuditLedger` implementation over `StorageEngine`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use histdb_core::models::{AuditEntry, SourceItem, SourceKind};
use histdb_core::traits::IAuditLedger;
use histdb_core::{HistError, HistResult};

use crate::queries::audit_ops;
use crate::StorageEngine;

#[derive(Clone)]
pub struct AuditLedger {
    storage: Arc<StorageEngine>,
}

impl AuditLedger {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Record `item` on a connection that is already inside the caller's transaction.
    pub fn record_in(conn: &Connection, table: &str, item: &SourceItem) -> HistResult<bool> {
        let inserted = audit_ops::insert_entry(conn, table, item, Utc::now())?;
        if inserted {
            debug!(table, locator = %item.locator, kind = %item.kind, "audit entry recorded");
        } else {
            info!(table, locator = %item.locator, kind = %item.kind, "duplicate source item suppressed");
        }
        Ok(inserted)
    }

    /// Check `candidates` against a known latest `source_time`.
    pub fn check_monotonic(
        table: &str,
        latest: Option<DateTime<Utc>>,
        candidates: &[SourceItem],
    ) -> HistResult<()> {
        let Some(latest) = latest else {
            return Ok(());
        };
        if let Some(late) = candidates.iter().find(|c| c.source_time <= latest) {
            warn!(
                table,
                locator = %late.locator,
                source_time = %late.source_time,
                %latest,
                "source item is not newer than the ledger"
            );
            return Err(HistError::OrderingViolation {
                table: table.to_string(),
                locator: late.locator.clone(),
                source_time: late.source_time,
                latest,
            });
        }
        Ok(())
    }

    /// Delete entries with `source_time > ts` (`>=` when inclusive).
    pub fn purge_after(&self, table: &str, ts: DateTime<Utc>, inclusive: bool) -> HistResult<u64> {
        let n = self
            .storage
            .with_writer(|conn| audit_ops::purge_after(conn, table, ts, inclusive))?;
        info!(table, %ts, inclusive, purged = n, "purged audit entries after timestamp");
        Ok(n)
    }

    /// Delete every entry for `table`.
    pub fn purge(&self, table: &str) -> HistResult<u64> {
        let n = self
            .storage
            .with_writer(|conn| audit_ops::purge_table(conn, table))?;
        info!(table, purged = n, "purged audit entries");
        Ok(n)
    }

    /// All entries for `table`, oldest first.
    pub fn entries(&self, table: &str) -> HistResult<Vec<AuditEntry>> {
        self.storage
            .with_reader(|conn| audit_ops::entries(conn, table))
    }
}

impl IAuditLedger for AuditLedger {
    fn record(&self, table: &str, item: &SourceItem) -> HistResult<bool> {
        self.storage
            .with_writer(|conn| Self::record_in(conn, table, item))
    }

    fn filter_unprocessed(&self, table: &str, locators: &[String]) -> HistResult<Vec<String>> {
        let remaining = self
            .storage
            .with_reader(|conn| audit_ops::filter_unprocessed(conn, table, locators))?;
        debug!(
            table,
            candidates = locators.len(),
            unprocessed = remaining.len(),
            "filtered processed locators"
        );
        Ok(remaining)
    }

    fn latest_entry(
        &self,
        table: &str,
        kind: SourceKind,
        as_of: Option<DateTime<Utc>>,
    ) -> HistResult<Option<AuditEntry>> {
        self.storage
            .with_reader(|conn| audit_ops::latest_entry(conn, table, kind, as_of))
    }

    fn enforce_monotonic(&self, table: &str, candidates: &[SourceItem]) -> HistResult<()> {
        let latest = self
            .storage
            .with_reader(|conn| audit_ops::latest_source_time(conn, table))?;
        Self::check_monotonic(table, latest, candidates)
    }

    fn purge_before(&self, table: &str, ts: DateTime<Utc>, inclusive: bool) -> HistResult<u64> {
        let n = self
            .storage
            .with_writer(|conn| audit_ops::purge_before(conn, table, ts, inclusive))?;
        info!(table, %ts, inclusive, purged = n, "purged audit entries before timestamp");
        Ok(n)
    }
}
