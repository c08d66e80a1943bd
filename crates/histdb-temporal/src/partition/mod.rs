//! Time partitioning of row batches into ordered application-time buckets.
//!
//! Partitioning is two-phase: `partition` computes buckets and the watermark
//! they would produce without mutating anything, and the caller calls
//! `advance` once the buckets are durably applied. A batch that fails and is
//! retried is therefore never filtered by its own watermark.

mod watermark;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use histdb_core::models::{Row, RowKey, TimePartitionSpec, UniqueStrategy};
use histdb_core::{HistError, HistResult};

pub use watermark::Watermark;

/// One unit of work: rows to apply at `bucket_time`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub bucket_time: DateTime<Utc>,
    pub rows: Vec<Row>,
}

/// Result of partitioning one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitioned {
    /// Strictly ascending by `bucket_time`.
    pub buckets: Vec<Bucket>,
    /// Rows discarded by the watermark filter.
    pub dropped: usize,
    /// Where the watermark moves once these buckets are applied.
    pub proposed_watermark: Option<DateTime<Utc>>,
}

impl Partitioned {
    pub fn row_count(&self) -> usize {
        self.buckets.iter().map(|b| b.rows.len()).sum()
    }
}

/// Buckets batches for one stream and owns that stream's watermark.
#[derive(Debug, Clone)]
pub struct TimePartitioner {
    spec: Option<TimePartitionSpec>,
    key_columns: Vec<String>,
    watermark: Watermark,
}

impl TimePartitioner {
    /// `spec = None` puts every batch into a single bucket at its nominal time.
    pub fn new(spec: Option<TimePartitionSpec>, key_columns: Vec<String>) -> Self {
        Self {
            spec,
            key_columns,
            watermark: Watermark::new(),
        }
    }

    pub fn with_watermark(mut self, watermark: Watermark) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn spec(&self) -> Option<&TimePartitionSpec> {
        self.spec.as_ref()
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Move the watermark forward after the buckets of a batch are committed.
    pub fn advance(&mut self, to: DateTime<Utc>) -> bool {
        let moved = self.watermark.advance(to);
        if moved {
            debug!(watermark = %to, "watermark advanced");
        }
        moved
    }

    /// Bucket `rows` without touching the watermark.
    pub fn partition(&self, rows: Vec<Row>, nominal_time: DateTime<Utc>) -> HistResult<Partitioned> {
        let Some(spec) = &self.spec else {
            return Ok(Partitioned {
                buckets: vec![Bucket {
                    bucket_time: nominal_time,
                    rows,
                }],
                dropped: 0,
                proposed_watermark: None,
            });
        };

        let mut stamped = Vec::with_capacity(rows.len());
        let mut dropped = 0;
        for (i, row) in rows.into_iter().enumerate() {
            let ts = row
                .get(&spec.time_column)
                .and_then(|v| v.as_timestamp())
                .ok_or_else(|| {
                    HistError::ValidationFailure(format!(
                        "row {i} has no timestamp in partition column '{}'",
                        spec.time_column
                    ))
                })?;
            if spec.filter_past_events && !self.watermark.admits(ts) {
                dropped += 1;
                continue;
            }
            stamped.push((ts, row));
        }
        if dropped > 0 {
            warn!(
                dropped,
                watermark = ?self.watermark.get(),
                "dropped rows at or before the watermark"
            );
        }

        // Stable: ties keep arrival order, which `first`/`last` rely on.
        stamped.sort_by_key(|(ts, _)| *ts);

        let mut grouped: BTreeMap<DateTime<Utc>, Vec<Row>> = BTreeMap::new();
        for (ts, row) in stamped {
            grouped.entry(spec.bucket_time(ts)).or_default().push(row);
        }

        let buckets = grouped
            .into_iter()
            .map(|(bucket_time, rows)| {
                let rows = self.unique_in_bucket(rows, spec.unique_strategy)?;
                Ok(Bucket { bucket_time, rows })
            })
            .collect::<HistResult<Vec<_>>>()?;

        let proposed_watermark = buckets
            .last()
            .map(|b| b.bucket_time - spec.round_up_offset());
        debug!(
            buckets = buckets.len(),
            dropped,
            proposed_watermark = ?proposed_watermark,
            "partitioned batch"
        );
        Ok(Partitioned {
            buckets,
            dropped,
            proposed_watermark,
        })
    }

    /// Keep one row per key within a bucket, in order of the kept rows' arrival.
    fn unique_in_bucket(&self, rows: Vec<Row>, strategy: UniqueStrategy) -> HistResult<Vec<Row>> {
        let mut slot: HashMap<RowKey, usize> = HashMap::new();
        let mut kept: Vec<Option<Row>> = Vec::with_capacity(rows.len());
        for row in rows {
            let key = RowKey::from_row(&row, &self.key_columns).ok_or_else(|| {
                HistError::ValidationFailure(format!(
                    "row is missing key columns {:?}",
                    self.key_columns
                ))
            })?;
            let existing = slot.get(&key).copied();
            match (existing, strategy) {
                (Some(_), UniqueStrategy::First) => {}
                (Some(i), UniqueStrategy::Last) => {
                    kept[i] = None;
                    slot.insert(key, kept.len());
                    kept.push(Some(row));
                }
                (None, _) => {
                    slot.insert(key, kept.len());
                    kept.push(Some(row));
                }
            }
        }
        Ok(kept.into_iter().flatten().collect())
    }
}
