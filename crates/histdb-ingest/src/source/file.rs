//! Snapshot files, applied oldest first by modification time.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use histdb_core::errors::IngestError;
use histdb_core::models::{SourceItem, SourceKind};
use histdb_core::time::truncate_micros;
use histdb_core::traits::IAuditLedger;
use histdb_core::HistResult;

use super::loader::{JsonRowLoader, RowLoader};
use super::{noop_commit, InputSource, SourceUnit};

/// A fixed list of candidate files. Discovering the list is the caller's job.
#[derive(Debug)]
pub struct FileSource<L = JsonRowLoader> {
    paths: Vec<PathBuf>,
    loader: L,
    scrape_limit: Option<usize>,
    queue: VecDeque<SourceItem>,
}

impl FileSource<JsonRowLoader> {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self::with_loader(paths, JsonRowLoader)
    }
}

impl<L: RowLoader> FileSource<L> {
    pub fn with_loader(paths: Vec<PathBuf>, loader: L) -> Self {
        Self {
            paths,
            loader,
            scrape_limit: None,
            queue: VecDeque::new(),
        }
    }

    /// Apply at most `limit` files per run.
    pub fn with_scrape_limit(mut self, limit: Option<usize>) -> Self {
        self.scrape_limit = limit;
        self
    }

    /// Files queued by the last `prepare`, in application order.
    pub fn pending(&self) -> Vec<String> {
        self.queue.iter().map(|i| i.locator.clone()).collect()
    }
}

/// File mtime truncated to the precision the ledger stores.
fn modified_at(path: &Path) -> HistResult<DateTime<Utc>> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| IngestError::SourceUnavailable(format!("{}: {e}", path.display())))?;
    let ts = DateTime::<Utc>::from(modified);
    Ok(truncate_micros(ts))
}

impl<L: RowLoader> InputSource for FileSource<L> {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    /// Queue unprocessed files oldest first, failing the run if any is not newer
    /// than what the table has already seen.
    fn prepare(&mut self, ledger: &dyn IAuditLedger, table: &str) -> HistResult<()> {
        let locators: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
        let unprocessed = ledger.filter_unprocessed(table, &locators)?;

        let mut candidates = Vec::with_capacity(unprocessed.len());
        for locator in unprocessed {
            let source_time = modified_at(Path::new(&locator))?;
            candidates.push(SourceItem::new(SourceKind::File, locator, source_time));
        }
        candidates.sort_by(|a, b| {
            a.source_time
                .cmp(&b.source_time)
                .then_with(|| a.locator.cmp(&b.locator))
        });
        ledger.enforce_monotonic(table, &candidates)?;

        if let Some(limit) = self.scrape_limit {
            candidates.truncate(limit);
        }
        info!(
            table,
            candidates = locators.len(),
            queued = candidates.len(),
            "prepared file source"
        );
        self.queue = candidates.into();
        Ok(())
    }

    async fn fetch(&mut self) -> HistResult<Option<SourceUnit>> {
        let Some(item) = self.queue.pop_front() else {
            return Ok(None);
        };
        let bytes = match tokio::fs::read(&item.locator).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.queue.push_front(item.clone());
                return Err(IngestError::SourceUnavailable(format!("{}: {e}", item.locator)).into());
            }
        };
        let rows = self.loader.load(&item.locator, &bytes)?;
        debug!(locator = %item.locator, rows = rows.len(), "loaded file");
        Ok(Some(SourceUnit {
            nominal_time: item.source_time,
            item,
            rows,
            commit: noop_commit(),
        }))
    }

    fn cleanup(&mut self) {
        self.queue.clear();
    }
}
