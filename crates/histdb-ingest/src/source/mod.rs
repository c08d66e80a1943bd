//! Input sources: where units of raw rows come from and how they are acknowledged.

mod channel;
mod file;
mod loader;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use histdb_core::models::{Row, SourceItem, SourceKind, UpsertCounts};
use histdb_core::traits::IAuditLedger;
use histdb_core::HistResult;

pub use channel::{AckLog, ChannelSource, StreamMessage};
pub use file::FileSource;
pub use loader::{rows_from_json, JsonRowLoader, RowLoader};

/// What the coordinator knows about a unit once its transaction has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitContext {
    pub table: String,
    pub item: SourceItem,
    /// `false` when the ledger already held the item and nothing was written.
    pub applied: bool,
    pub counts: UpsertCounts,
}

pub type CommitFuture = Pin<Box<dyn Future<Output = HistResult<bool>> + Send>>;

/// Post-commit callback. `Ok(false)` reports a failed acknowledgement.
pub type CommitFn = Box<dyn FnOnce(CommitContext) -> CommitFuture + Send>;

/// Box an async closure as a `CommitFn`.
pub fn commit_fn<F, Fut>(f: F) -> CommitFn
where
    F: FnOnce(CommitContext) -> Fut + Send + 'static,
    Fut: Future<Output = HistResult<bool>> + Send + 'static,
{
    Box::new(move |ctx: CommitContext| -> CommitFuture { Box::pin(f(ctx)) })
}

/// Callback for sources with nothing to acknowledge.
pub fn noop_commit() -> CommitFn {
    commit_fn(|_| async { Ok(true) })
}

/// One unit of input.
pub struct SourceUnit {
    pub item: SourceItem,
    pub rows: Vec<Row>,
    /// Effective time used when the dataset has no time partitioning.
    pub nominal_time: DateTime<Utc>,
    pub commit: CommitFn,
}

impl fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceUnit")
            .field("item", &self.item)
            .field("rows", &self.rows.len())
            .field("nominal_time", &self.nominal_time)
            .finish_non_exhaustive()
    }
}

/// A pull-based source of units for one dataset.
///
/// `prepare` runs before every attempt of a run; `fetch` is only ever awaited
/// by the producer task and never concurrently with the apply of a previous
/// unit. `Ok(None)` ends the iteration.
pub trait InputSource: Send {
    fn kind(&self) -> SourceKind;

    fn prepare(&mut self, ledger: &dyn IAuditLedger, table: &str) -> HistResult<()>;

    fn fetch(&mut self) -> impl Future<Output = HistResult<Option<SourceUnit>>> + Send;

    fn cleanup(&mut self) {}
}
