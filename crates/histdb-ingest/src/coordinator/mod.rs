//! IngestionCoordinator: drives one dataset run per source, with retries.
//!
//! Per unit: transform, partition, then one write transaction holding the
//! unit's audit entry and every bucket (each in its own savepoint, in
//! ascending bucket order). Once that transaction commits the dataset's
//! watermark advances and the source's commit callback runs.
//!
//! Transient failures roll back the unit in flight and restart the run after
//! a fixed delay; anything else aborts at once. Units committed before a
//! failure stay committed, and the next attempt resumes from the ledger.

mod producer;
mod report;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use histdb_core::config::{DatasetConfig, IngestConfig};
use histdb_core::errors::{HistErrorCode, IngestError, StorageError};
use histdb_core::models::{Row, SourceItem, SourceKind, UpsertCounts};
use histdb_core::transform::TransformRegistry;
use histdb_core::traits::IAuditLedger;
use histdb_core::HistResult;
use histdb_storage::{to_storage_err, AuditLedger, StorageEngine};
use histdb_temporal::{upsert, Bucket, TimePartitioner, Watermark};

use crate::source::{CommitContext, CommitFn, InputSource, SourceUnit};
use producer::Producer;

pub use report::{RunReport, RunState, UnitOutcome};

/// Result of one dataset run plus the source, for reuse by the next run.
///
/// `source` is `None` only if the producer task panicked.
pub struct DatasetRun<S> {
    pub result: HistResult<RunReport>,
    pub source: Option<S>,
}

#[derive(Clone)]
pub struct IngestionCoordinator {
    storage: Arc<StorageEngine>,
    ledger: AuditLedger,
    registry: Arc<TransformRegistry>,
    config: IngestConfig,
    watermarks: Arc<Mutex<BTreeMap<String, Watermark>>>,
}

impl IngestionCoordinator {
    pub fn new(
        storage: Arc<StorageEngine>,
        registry: Arc<TransformRegistry>,
        config: IngestConfig,
    ) -> Self {
        Self {
            ledger: AuditLedger::new(Arc::clone(&storage)),
            storage,
            registry,
            config,
            watermarks: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn storage(&self) -> &Arc<StorageEngine> {
        &self.storage
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    /// Watermark of a dataset once seeded from the ledger or advanced by a commit.
    pub fn watermark(&self, dataset: &str) -> Option<DateTime<Utc>> {
        self.watermarks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dataset)
            .and_then(Watermark::get)
    }

    /// The dataset's watermark, seeded on first use.
    ///
    /// File datasets restart from the ledger's latest `source_time`; streams
    /// restart from zero.
    fn load_watermark(&self, dataset: &DatasetConfig, kind: SourceKind) -> HistResult<Watermark> {
        if let Some(known) = self
            .watermarks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&dataset.name)
        {
            return Ok(*known);
        }
        let watermark = match kind {
            SourceKind::File => self
                .ledger
                .latest_entry(&dataset.table.name, SourceKind::File, None)?
                .map_or_else(Watermark::new, |entry| Watermark::seeded(entry.source_time)),
            SourceKind::Stream => Watermark::new(),
        };
        if let Some(at) = watermark.get() {
            debug!(dataset = %dataset.name, watermark = %at, "watermark seeded from ledger");
        }
        self.store_watermark(&dataset.name, watermark);
        Ok(watermark)
    }

    fn store_watermark(&self, dataset: &str, watermark: Watermark) {
        self.watermarks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dataset.to_string(), watermark);
    }

    /// Run `dataset` to completion, discarding the source afterwards.
    pub async fn run_dataset<S>(&self, dataset: &DatasetConfig, source: S) -> HistResult<RunReport>
    where
        S: InputSource + 'static,
    {
        let (state, _) = watch::channel(RunState::Idle);
        self.execute(dataset, source, &state).await.result
    }

    /// Run `dataset`, publishing every state transition on `state`.
    pub async fn execute<S>(
        &self,
        dataset: &DatasetConfig,
        source: S,
        state: &watch::Sender<RunState>,
    ) -> DatasetRun<S>
    where
        S: InputSource + 'static,
    {
        let started = Instant::now();
        let name = dataset.name.as_str();
        info!(dataset = name, table = %dataset.table.name, "dataset run started");

        let mut report = RunReport::default();
        let mut source = Some(source);
        let result = match self.ensure_dataset(dataset).await {
            Err(e) => Err(e),
            Ok(()) => self.retry_loop(dataset, &mut source, state, &mut report).await,
        };
        if let Some(source) = source.as_mut() {
            source.cleanup();
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(report) => {
                state.send_replace(RunState::Idle);
                info!(
                    dataset = name,
                    units = report.units_applied,
                    duplicates = report.duplicates,
                    dropped = report.rows_dropped,
                    attempts = report.attempts,
                    elapsed_ms,
                    "dataset run finished"
                );
            }
            Err(e) => {
                state.send_replace(RunState::Failed(e.to_string()));
                error!(
                    dataset = name,
                    error = %e,
                    code = e.error_code(),
                    elapsed_ms,
                    "dataset run failed"
                );
            }
        }
        DatasetRun { result, source }
    }

    /// Run several datasets concurrently over the shared storage.
    pub async fn run_all<S>(
        &self,
        jobs: Vec<(DatasetConfig, S)>,
    ) -> BTreeMap<String, HistResult<RunReport>>
    where
        S: InputSource + 'static,
    {
        let mut tasks = JoinSet::new();
        let mut pending = BTreeSet::new();
        for (dataset, source) in jobs {
            let coordinator = self.clone();
            pending.insert(dataset.name.clone());
            tasks.spawn(async move {
                let result = coordinator.run_dataset(&dataset, source).await;
                (dataset.name, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    pending.remove(&name);
                    results.insert(name, result);
                }
                Err(e) => error!(error = %e, "dataset task failed"),
            }
        }
        for name in pending {
            let failed = IngestError::DatasetFailed {
                dataset: name.clone(),
                reason: "task panicked or was cancelled".to_string(),
            };
            results.insert(name, Err(failed.into()));
        }
        results
    }

    async fn ensure_dataset(&self, dataset: &DatasetConfig) -> HistResult<()> {
        dataset.validate()?;
        let schema = dataset.table.clone();
        self.on_storage(move |storage| storage.ensure_table(&schema))
            .await
            .map(|_| ())
    }

    async fn retry_loop<S>(
        &self,
        dataset: &DatasetConfig,
        source: &mut Option<S>,
        state: &watch::Sender<RunState>,
        report: &mut RunReport,
    ) -> HistResult<RunReport>
    where
        S: InputSource + 'static,
    {
        let max_attempts = self.config.num_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            report.attempts = attempt;
            let Some(current) = source.take() else {
                return Err(IngestError::DatasetFailed {
                    dataset: dataset.name.clone(),
                    reason: "source was lost by a failed producer task".to_string(),
                }
                .into());
            };
            let (returned, outcome) = self.attempt(dataset, current, state, report).await;
            *source = returned;

            let err = match outcome {
                Ok(()) => return Ok(report.clone()),
                Err(e) => e,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(IngestError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                }
                .into());
            }
            warn!(
                dataset = %dataset.name,
                attempt,
                max_attempts,
                error = %err,
                code = err.error_code(),
                delay_ms = self.config.retry_delay_ms,
                "transient failure, retrying dataset run"
            );
            tokio::time::sleep(self.config.retry_delay()).await;
        }
    }

    async fn attempt<S>(
        &self,
        dataset: &DatasetConfig,
        mut source: S,
        state: &watch::Sender<RunState>,
        report: &mut RunReport,
    ) -> (Option<S>, HistResult<()>)
    where
        S: InputSource + 'static,
    {
        if let Err(e) = source.prepare(&self.ledger, &dataset.table.name) {
            return (Some(source), Err(e));
        }
        let watermark = match self.load_watermark(dataset, source.kind()) {
            Ok(watermark) => watermark,
            Err(e) => return (Some(source), Err(e)),
        };
        let mut producer = Producer::spawn(source, self.config.channel_capacity);
        let outcome = self.drain(dataset, watermark, &mut producer, state, report).await;
        (producer.finish().await, outcome)
    }

    async fn drain<S>(
        &self,
        dataset: &DatasetConfig,
        watermark: Watermark,
        producer: &mut Producer<S>,
        state: &watch::Sender<RunState>,
        report: &mut RunReport,
    ) -> HistResult<()>
    where
        S: InputSource + 'static,
    {
        let mut partitioner = TimePartitioner::new(
            dataset.time_partition.clone(),
            dataset.table.key_columns.clone(),
        )
        .with_watermark(watermark);

        let mut index = 0;
        loop {
            state.send_replace(RunState::Fetching(index));
            let Some(unit) = producer.next().await? else {
                debug!(dataset = %dataset.name, units = index, "source exhausted");
                return Ok(());
            };
            let SourceUnit {
                item,
                rows,
                nominal_time,
                commit,
            } = unit;
            let (outcome, counts) = self
                .process_unit(
                    dataset,
                    &mut partitioner,
                    item.clone(),
                    rows,
                    nominal_time,
                    index,
                    state,
                )
                .await?;
            report.record(&outcome);

            state.send_replace(RunState::Committing(index));
            let ctx = CommitContext {
                table: dataset.table.name.clone(),
                item,
                applied: outcome != UnitOutcome::Duplicate,
                counts,
            };
            run_commit(commit, ctx).await?;
            index += 1;
        }
    }

    /// Everything up to and including the unit's transaction.
    #[allow(clippy::too_many_arguments)]
    async fn process_unit(
        &self,
        dataset: &DatasetConfig,
        partitioner: &mut TimePartitioner,
        item: SourceItem,
        rows: Vec<Row>,
        nominal_time: DateTime<Utc>,
        index: usize,
        state: &watch::Sender<RunState>,
    ) -> HistResult<(UnitOutcome, UpsertCounts)> {
        let table = dataset.table.name.as_str();

        if item.kind == SourceKind::Stream {
            let unprocessed = self
                .ledger
                .filter_unprocessed(table, std::slice::from_ref(&item.locator))?;
            if unprocessed.is_empty() {
                info!(table, locator = %item.locator, "redelivered item already applied");
                return Ok((UnitOutcome::Duplicate, UpsertCounts::default()));
            }
        }

        state.send_replace(RunState::Partitioning(index));
        let rows = self.registry.apply_all(&dataset.transforms, rows)?;
        let partitioned = partitioner.partition(rows, nominal_time)?;
        let dropped = partitioned.dropped;
        let proposed = partitioned.proposed_watermark;

        state.send_replace(RunState::Applying(index));
        let Some(counts) = self.apply_unit(dataset, item, partitioned.buckets).await? else {
            return Ok((UnitOutcome::Duplicate, UpsertCounts::default()));
        };
        if let Some(to) = proposed {
            if partitioner.advance(to) {
                self.store_watermark(&dataset.name, partitioner.watermark());
            }
        }
        Ok((UnitOutcome::Applied { counts, dropped }, counts))
    }

    /// Record `item` and apply `buckets` in one transaction.
    /// `None` when the ledger already held the item.
    async fn apply_unit(
        &self,
        dataset: &DatasetConfig,
        item: SourceItem,
        buckets: Vec<Bucket>,
    ) -> HistResult<Option<UpsertCounts>> {
        let schema = dataset.table.clone();
        let policy = dataset.delta;
        self.on_storage(move |storage| {
            storage.in_transaction(|tx| {
                if !AuditLedger::record_in(tx, &schema.name, &item)? {
                    return Ok(None);
                }
                let mut total = UpsertCounts::default();
                for bucket in buckets {
                    let bucket_time = bucket.bucket_time;
                    let sp = tx.savepoint().map_err(to_storage_err)?;
                    let counts = upsert::apply(&sp, &schema, bucket.rows, bucket_time, &policy)?;
                    sp.commit().map_err(to_storage_err)?;
                    debug!(
                        table = %schema.name,
                        bucket = %bucket_time,
                        written = counts.written(),
                        "bucket applied"
                    );
                    total += counts;
                }
                Ok(Some(total))
            })
        })
        .await
    }

    /// Run blocking storage work off the async workers.
    async fn on_storage<F, T>(&self, f: F) -> HistResult<T>
    where
        F: FnOnce(&StorageEngine) -> HistResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || f(&storage))
            .await
            .map_err(|e| StorageError::SqliteError {
                message: format!("storage task failed: {e}"),
            })?
    }
}

async fn run_commit(commit: CommitFn, ctx: CommitContext) -> HistResult<()> {
    let locator = ctx.item.locator.clone();
    if commit(ctx).await? {
        debug!(locator = %locator, "commit callback succeeded");
        Ok(())
    } else {
        Err(IngestError::CommitFailed {
            locator,
            reason: "callback reported failure".to_string(),
        }
        .into())
    }
}
