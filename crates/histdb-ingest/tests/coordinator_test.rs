//! Coordinator behaviour with a scripted source: retries, aborts, partial commits,
//! transforms, time partitioning, concurrent datasets.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use histdb_core::config::{DatasetConfig, IngestConfig, ObservabilityConfig};
use histdb_core::errors::{IngestError, TemporalError};
use histdb_core::logging::init_tracing;
use histdb_core::models::{
    BucketInterval, BucketStrategy, ColumnDef, ColumnType, DeltaPolicy, Row, RowFinality, RowKey,
    SourceItem, SourceKind, TableSchema, TimePartitionSpec, UniqueStrategy, Value,
};
use histdb_core::time::parse_ts;
use histdb_core::traits::IAuditLedger;
use histdb_core::transform::{TransformRegistry, TransformSpec};
use histdb_core::{HistError, HistResult};
use histdb_ingest::{noop_commit, InputSource, IngestionCoordinator, RunState, SourceUnit};
use histdb_storage::StorageEngine;
use histdb_temporal::TemporalEngine;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::watch;

fn t(s: &str) -> DateTime<Utc> {
    parse_ts(s).unwrap()
}

fn setup(num_retries: u32) -> (TempDir, IngestionCoordinator) {
    init_tracing(&ObservabilityConfig::default());
    let dir = TempDir::new().unwrap();
    let coordinator = open(dir.path(), num_retries);
    (dir, coordinator)
}

/// A coordinator over the database in `dir`, with no in-memory state.
fn open(dir: &Path, num_retries: u32) -> IngestionCoordinator {
    let storage = Arc::new(StorageEngine::open(&dir.join("coordinator.db")).unwrap());
    let config = IngestConfig {
        num_retries,
        retry_delay_ms: 5,
        fetch_timeout_ms: 50,
        channel_capacity: 1,
    };
    let registry = Arc::new(TransformRegistry::with_builtins());
    IngestionCoordinator::new(storage, registry, config)
}

fn schema(name: &str) -> TableSchema {
    TableSchema::new(
        name,
        &["id"],
        vec![
            ColumnDef::new("id", ColumnType::Int),
            ColumnDef::new("price", ColumnType::Float).required(),
        ],
    )
}

fn row(id: i64, price: f64) -> Row {
    let mut r = Row::new();
    r.insert("id".into(), Value::Int(id));
    r.insert("price".into(), Value::Float(price));
    r
}

/// Hands out pre-built units; the first `transient_failures` fetches fail.
struct ScriptedSource {
    units: VecDeque<(String, DateTime<Utc>, Vec<Row>)>,
    transient_failures: u32,
    prepares: Arc<AtomicU32>,
}

impl ScriptedSource {
    fn new(units: Vec<(&str, &str, Vec<Row>)>) -> Self {
        Self {
            units: units
                .into_iter()
                .map(|(locator, at, rows)| (locator.to_string(), t(at), rows))
                .collect(),
            transient_failures: 0,
            prepares: Arc::new(AtomicU32::new(0)),
        }
    }

    fn failing_first(mut self, n: u32) -> Self {
        self.transient_failures = n;
        self
    }
}

impl InputSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn prepare(&mut self, _ledger: &dyn IAuditLedger, _table: &str) -> HistResult<()> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch(&mut self) -> HistResult<Option<SourceUnit>> {
        if self.transient_failures > 0 {
            self.transient_failures -= 1;
            return Err(IngestError::SourceUnavailable("connection reset".into()).into());
        }
        Ok(self.units.pop_front().map(|(locator, at, rows)| SourceUnit {
            item: SourceItem::new(SourceKind::File, locator, at),
            rows,
            nominal_time: at,
            commit: noop_commit(),
        }))
    }
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let (_dir, coordinator) = setup(2);
    let source = ScriptedSource::new(vec![
        ("u1", "2024-01-01T00:00:00Z", vec![row(1, 1.0)]),
        ("u2", "2024-01-02T00:00:00Z", vec![row(1, 2.0)]),
    ])
    .failing_first(1);
    let prepares = Arc::clone(&source.prepares);

    let report = coordinator
        .run_dataset(&DatasetConfig::new("prices", schema("prices")), source)
        .await
        .unwrap();
    assert_eq!(report.attempts, 2);
    assert_eq!(report.units_applied, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(prepares.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retries_are_bounded() {
    let (_dir, coordinator) = setup(2);
    let source = ScriptedSource::new(vec![]).failing_first(10);
    let prepares = Arc::clone(&source.prepares);

    let err = coordinator
        .run_dataset(&DatasetConfig::new("prices", schema("prices")), source)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HistError::IngestError(IngestError::RetriesExhausted { attempts: 3, .. })
    ));
    assert_eq!(prepares.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn validation_failure_aborts_without_retry_and_keeps_earlier_units() {
    let (_dir, coordinator) = setup(3);
    let mut missing_price = Row::new();
    missing_price.insert("id".into(), Value::Int(2));
    let source = ScriptedSource::new(vec![
        ("good", "2024-01-01T00:00:00Z", vec![row(1, 1.0)]),
        ("bad", "2024-01-02T00:00:00Z", vec![missing_price]),
    ]);
    let prepares = Arc::clone(&source.prepares);

    let (state, rx) = watch::channel(RunState::Idle);
    let run = coordinator
        .execute(&DatasetConfig::new("prices", schema("prices")), source, &state)
        .await;
    assert!(matches!(run.result, Err(HistError::ValidationFailure(_))));
    assert!(run.source.is_some());
    assert_eq!(prepares.load(Ordering::SeqCst), 1);
    assert!(matches!(&*rx.borrow(), RunState::Failed(_)));

    let entries = coordinator.ledger().entries("prices").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].locator, "good");
    let temporal = TemporalEngine::new(Arc::clone(coordinator.storage()));
    assert_eq!(temporal.current_rows("prices").unwrap().len(), 1);
}

#[tokio::test]
async fn effective_time_before_current_version_is_rejected() {
    let (_dir, coordinator) = setup(3);
    let source = ScriptedSource::new(vec![
        ("later", "2024-01-02T00:00:00Z", vec![row(1, 1.0)]),
        ("earlier", "2024-01-01T00:00:00Z", vec![row(1, 2.0)]),
    ]);

    let err = coordinator
        .run_dataset(&DatasetConfig::new("prices", schema("prices")), source)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HistError::TemporalError(TemporalError::TemporalOrderViolation { .. })
    ));
    assert_eq!(coordinator.ledger().entries("prices").unwrap().len(), 1);
}

#[tokio::test]
async fn transforms_run_before_apply() {
    let (_dir, coordinator) = setup(0);
    let mut dataset = DatasetConfig::new("prices", schema("prices"));
    dataset.transforms = vec![TransformSpec::new("null_if_gte", vec![json!("price"), json!(1000)])];
    let source = ScriptedSource::new(vec![(
        "u1",
        "2024-01-01T00:00:00Z",
        vec![row(1, 5.0), row(2, 5000.0)],
    )]);

    coordinator.run_dataset(&dataset, source).await.unwrap();
    let temporal = TemporalEngine::new(Arc::clone(coordinator.storage()));
    let current = temporal.current_rows("prices").unwrap();
    assert_eq!(current[0].columns["price"], Value::Float(5.0));
    assert_eq!(current[1].columns["price"], Value::Null);
}

#[tokio::test]
async fn unknown_transform_is_a_validation_failure() {
    let (_dir, coordinator) = setup(3);
    let mut dataset = DatasetConfig::new("prices", schema("prices"));
    dataset.transforms = vec![TransformSpec::new("no_such_transform", vec![])];
    let source = ScriptedSource::new(vec![("u1", "2024-01-01T00:00:00Z", vec![row(1, 5.0)])]);

    let err = coordinator.run_dataset(&dataset, source).await.unwrap_err();
    assert!(matches!(err, HistError::ValidationFailure(_)));
}

fn ticks() -> DatasetConfig {
    let mut dataset = DatasetConfig::new(
        "ticks",
        TableSchema::new(
            "ticks",
            &["id"],
            vec![
                ColumnDef::new("id", ColumnType::Int),
                ColumnDef::new("at", ColumnType::Timestamp),
                ColumnDef::new("price", ColumnType::Float),
            ],
        ),
    );
    dataset.delta = DeltaPolicy {
        row_finality: RowFinality::Disabled,
        ..DeltaPolicy::default()
    };
    dataset.time_partition = Some(TimePartitionSpec {
        time_column: "at".into(),
        bucket_interval: BucketInterval::parse("1h").unwrap(),
        bucket_strategy: BucketStrategy::RoundDown,
        unique_strategy: UniqueStrategy::Last,
        filter_past_events: true,
    });
    dataset
}

fn tick(id: i64, at: &str, price: f64) -> Row {
    let mut r = row(id, price);
    r.insert("at".into(), Value::from(at));
    r
}

#[tokio::test]
async fn time_buckets_become_versions_and_the_watermark_filters_replays() {
    let (_dir, coordinator) = setup(0);
    let source = ScriptedSource::new(vec![
        (
            "batch-1",
            "2024-05-01T12:00:00Z",
            vec![
                tick(1, "2024-05-01T10:15:00Z", 1.0),
                tick(1, "2024-05-01T10:45:00Z", 1.5),
                tick(1, "2024-05-01T11:05:00Z", 2.0),
            ],
        ),
        (
            "batch-2",
            "2024-05-01T13:00:00Z",
            vec![
                tick(1, "2024-05-01T10:50:00Z", 9.0),
                tick(1, "2024-05-01T12:10:00Z", 3.0),
            ],
        ),
    ]);

    let report = coordinator.run_dataset(&ticks(), source).await.unwrap();
    assert_eq!(report.units_applied, 2);
    assert_eq!(report.rows_dropped, 1);
    assert_eq!(coordinator.watermark("ticks"), Some(t("2024-05-01T12:00:00Z")));

    let temporal = TemporalEngine::new(Arc::clone(coordinator.storage()));
    let chain = temporal.key_versions("ticks", &RowKey(vec![Value::Int(1)])).unwrap();
    let starts: Vec<_> = chain.iter().map(|v| v.valid_from).collect();
    assert_eq!(
        starts,
        vec![
            t("2024-05-01T10:00:00Z"),
            t("2024-05-01T11:00:00Z"),
            t("2024-05-01T12:00:00Z"),
        ]
    );
    assert_eq!(chain[0].columns["price"], Value::Float(1.5));
    assert_eq!(chain[2].columns["price"], Value::Float(3.0));
}

#[tokio::test]
async fn restarted_coordinator_seeds_file_watermark_from_ledger() {
    let (dir, first) = setup(0);
    let source = ScriptedSource::new(vec![(
        "batch-1",
        "2024-05-01T12:00:00Z",
        vec![tick(1, "2024-05-01T10:15:00Z", 1.0), tick(1, "2024-05-01T11:05:00Z", 2.0)],
    )]);
    first.run_dataset(&ticks(), source).await.unwrap();
    assert_eq!(first.watermark("ticks"), Some(t("2024-05-01T11:00:00Z")));
    drop(first);

    let restarted = open(dir.path(), 0);
    let source = ScriptedSource::new(vec![(
        "batch-2",
        "2024-05-01T13:00:00Z",
        vec![tick(1, "2024-05-01T11:30:00Z", 9.0), tick(1, "2024-05-01T12:10:00Z", 3.0)],
    )]);
    let report = restarted.run_dataset(&ticks(), source).await.unwrap();
    assert_eq!(report.rows_dropped, 1);
    assert_eq!(restarted.watermark("ticks"), Some(t("2024-05-01T12:00:00Z")));

    let temporal = TemporalEngine::new(Arc::clone(restarted.storage()));
    let chain = temporal.key_versions("ticks", &RowKey(vec![Value::Int(1)])).unwrap();
    let prices: Vec<_> = chain.iter().map(|v| v.columns["price"].clone()).collect();
    assert_eq!(prices, vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)]);
}

#[tokio::test]
async fn datasets_run_concurrently() {
    let (_dir, coordinator) = setup(1);
    let jobs = vec![
        (
            DatasetConfig::new("prices", schema("prices")),
            ScriptedSource::new(vec![("p1", "2024-01-01T00:00:00Z", vec![row(1, 1.0)])]),
        ),
        (
            DatasetConfig::new("quotes", schema("quotes")),
            ScriptedSource::new(vec![
                ("q1", "2024-01-01T00:00:00Z", vec![row(1, 1.0), row(2, 2.0)]),
                ("q2", "2024-01-02T00:00:00Z", vec![row(1, 1.0)]),
            ])
            .failing_first(1),
        ),
    ];

    let results = coordinator.run_all(jobs).await;
    assert_eq!(results.len(), 2);
    let prices = results["prices"].as_ref().unwrap();
    assert_eq!(prices.units_applied, 1);
    let quotes = results["quotes"].as_ref().unwrap();
    assert_eq!(quotes.units_applied, 2);
    assert_eq!(quotes.deleted, 1);
    assert_eq!(quotes.attempts, 2);

    let mut tables = coordinator.storage().list_tables().unwrap();
    tables.sort();
    assert_eq!(tables, vec!["prices".to_string(), "quotes".to_string()]);
}
