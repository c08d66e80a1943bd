//! IAuditLedger: idempotency and ordering gate over source items.

use chrono::{DateTime, Utc};

use crate::errors::HistResult;
use crate::models::{AuditEntry, SourceItem, SourceKind};

/// Exactly-once and in-order application of source items, per table.
///
/// "Has this exact item been applied" and "is this item late" are separate
/// questions: out-of-order application of snapshot diffs corrupts history even
/// when every item is applied only once.
pub trait IAuditLedger: Send + Sync {
    /// Insert an entry. `Ok(false)` means the item was already recorded.
    fn record(&self, table: &str, item: &SourceItem) -> HistResult<bool>;

    /// Locators with no prior entry for `table`, in input order, de-duplicated.
    fn filter_unprocessed(&self, table: &str, locators: &[String]) -> HistResult<Vec<String>>;

    /// Entry with the greatest `source_time` not after `as_of` (or the latest overall).
    fn latest_entry(
        &self,
        table: &str,
        kind: SourceKind,
        as_of: Option<DateTime<Utc>>,
    ) -> HistResult<Option<AuditEntry>>;

    /// Fail with `OrderingViolation` if any candidate is not newer than the table's latest entry.
    fn enforce_monotonic(&self, table: &str, candidates: &[SourceItem]) -> HistResult<()>;

    /// Delete entries with `source_time` before `ts` (or at `ts` when inclusive).
    fn purge_before(&self, table: &str, ts: DateTime<Utc>, inclusive: bool) -> HistResult<u64>;
}
