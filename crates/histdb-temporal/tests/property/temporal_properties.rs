//! Property tests: upsert idempotence and interval invariants, watermark monotonicity.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use histdb_core::models::{
    BucketInterval, BucketStrategy, ColumnDef, ColumnType, DeltaPolicy, Row, RowFinality,
    TableSchema, TimePartitionSpec, UniqueStrategy, Value,
};
use histdb_storage::StorageEngine;
use histdb_temporal::{TemporalEngine, TimePartitioner};

fn base() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn engine() -> TemporalEngine {
    let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
    storage
        .ensure_table(&TableSchema::new(
            "p",
            &["k"],
            vec![
                ColumnDef::new("k", ColumnType::Int),
                ColumnDef::new("v", ColumnType::Int),
            ],
        ))
        .unwrap();
    TemporalEngine::new(storage)
}

/// A snapshot: up to 6 keys, each with a small value or null.
fn snapshot_strategy() -> impl Strategy<Value = Vec<(i64, Option<i64>)>> {
    prop::collection::btree_map(0i64..6, prop::option::of(0i64..3), 0..6)
        .prop_map(|m| m.into_iter().collect())
}

fn to_rows(snapshot: &[(i64, Option<i64>)]) -> Vec<Row> {
    snapshot
        .iter()
        .map(|(k, v)| {
            let mut r = Row::new();
            r.insert("k".into(), Value::Int(*k));
            r.insert("v".into(), (*v).into());
            r
        })
        .collect()
}

/// Floats including the ones storage cannot keep bit for bit.
fn float_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(f64::NAN),
        Just(-0.0),
        Just(0.0),
        Just(f64::MIN_POSITIVE / 2.0),
        any::<f64>(),
    ]
}

fn measured_rows(cells: &[(f64, i64)]) -> Vec<Row> {
    cells
        .iter()
        .enumerate()
        .map(|(k, (v, nanos))| {
            let mut r = Row::new();
            r.insert("k".into(), Value::Int(k as i64));
            r.insert("v".into(), Value::Float(*v));
            r.insert("at".into(), Value::Timestamp(base() + Duration::nanoseconds(*nanos)));
            r
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Any sequence of snapshots at increasing times leaves every key with a
    /// valid chain, and the current view equals the last snapshot (dropoff).
    #[test]
    fn chains_stay_valid(snapshots in prop::collection::vec(snapshot_strategy(), 1..8)) {
        let engine = engine();
        let policy = DeltaPolicy::default();
        for (i, snap) in snapshots.iter().enumerate() {
            engine.apply("p", to_rows(snap), base() + Duration::hours(i as i64), &policy).unwrap();
        }
        engine.verify("p").unwrap();

        let last = snapshots.last().unwrap();
        let current = engine.current_rows("p").unwrap();
        prop_assert_eq!(current.len(), last.len());
        for (v, (k, val)) in current.iter().zip(last) {
            prop_assert_eq!(&v.key.0[0], &Value::Int(*k));
            prop_assert_eq!(&v.columns["v"], &Value::from(*val));
        }
    }

    /// Re-applying the latest snapshot later writes nothing.
    #[test]
    fn reapplication_is_noop(
        snapshots in prop::collection::vec(snapshot_strategy(), 1..6),
        later in 0i64..48,
        disabled in any::<bool>(),
    ) {
        let engine = engine();
        let policy = DeltaPolicy {
            row_finality: if disabled { RowFinality::Disabled } else { RowFinality::Dropoff },
            ..DeltaPolicy::default()
        };
        let n = snapshots.len() as i64;
        for (i, snap) in snapshots.iter().enumerate() {
            engine.apply("p", to_rows(snap), base() + Duration::hours(i as i64), &policy).unwrap();
        }
        let before = engine.all_versions("p").unwrap();
        let last = snapshots.last().unwrap();
        let counts = engine
            .apply("p", to_rows(last), base() + Duration::hours(n - 1 + later), &policy)
            .unwrap();
        prop_assert_eq!(counts.written(), 0);
        prop_assert_eq!(engine.all_versions("p").unwrap(), before);
    }

    /// Re-applying floats and nanosecond timestamps is unchanged after a round trip.
    #[test]
    fn stored_form_reapplies_as_unchanged(
        cells in prop::collection::vec((float_strategy(), 0i64..1_000_000_000_000), 1..6),
    ) {
        let storage = Arc::new(StorageEngine::open_in_memory().unwrap());
        storage
            .ensure_table(&TableSchema::new(
                "m",
                &["k"],
                vec![
                    ColumnDef::new("k", ColumnType::Int),
                    ColumnDef::new("v", ColumnType::Float),
                    ColumnDef::new("at", ColumnType::Timestamp),
                ],
            ))
            .unwrap();
        let engine = TemporalEngine::new(storage);
        let policy = DeltaPolicy::default();
        engine.apply("m", measured_rows(&cells), base(), &policy).unwrap();
        let before = engine.all_versions("m").unwrap();
        let counts = engine
            .apply("m", measured_rows(&cells), base() + Duration::hours(1), &policy)
            .unwrap();
        prop_assert_eq!(counts.written(), 0);
        prop_assert_eq!(engine.all_versions("m").unwrap(), before);
    }

    /// Feeding overlapping windows never regresses the watermark and never
    /// emits a row at or before it.
    #[test]
    fn watermark_is_monotonic(
        windows in prop::collection::vec(prop::collection::vec(0i64..600, 0..20), 1..10),
    ) {
        let spec = TimePartitionSpec {
            time_column: "at".into(),
            bucket_interval: BucketInterval::parse("15m").unwrap(),
            bucket_strategy: BucketStrategy::RoundDown,
            unique_strategy: UniqueStrategy::Last,
            filter_past_events: true,
        };
        let mut partitioner = TimePartitioner::new(Some(spec), vec!["k".to_string()]);
        let mut previous = None;
        for window in windows {
            let rows: Vec<Row> = window
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    let mut r = Row::new();
                    r.insert("k".into(), Value::Int(i as i64));
                    r.insert("at".into(), Value::Timestamp(base() + Duration::minutes(*m)));
                    r
                })
                .collect();
            let wm = partitioner.watermark();
            let out = partitioner.partition(rows, base()).unwrap();
            for bucket in &out.buckets {
                for row in &bucket.rows {
                    let at = row["at"].as_timestamp().unwrap();
                    prop_assert!(wm.admits(at));
                }
            }
            for pair in out.buckets.windows(2) {
                prop_assert!(pair[0].bucket_time < pair[1].bucket_time);
            }
            if let Some(to) = out.proposed_watermark {
                partitioner.advance(to);
            }
            let now = partitioner.watermark().get();
            prop_assert!(now >= previous);
            previous = now;
        }
    }
}
