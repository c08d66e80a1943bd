//! Classification of deduplicated incoming rows against the current view.

use std::collections::BTreeMap;

use histdb_core::models::{Row, RowFinality, RowKey, TableSchema, Value, VersionedRow};

/// What a snapshot-diff will write.
#[derive(Debug, Default)]
pub struct UpsertPlan {
    /// Keys with no current row.
    pub inserts: Vec<(RowKey, Row)>,
    /// Keys whose values differ: new values plus the current version they replace.
    pub updates: Vec<(Row, VersionedRow)>,
    /// Current versions absent from the snapshot (dropoff only).
    pub deletes: Vec<VersionedRow>,
    pub unchanged: u64,
}

/// Whether `incoming` carries the same non-key values as `current`.
///
/// Absent and null are the same; otherwise equality is exact.
pub fn values_equal(schema: &TableSchema, incoming: &Row, current: &VersionedRow) -> bool {
    schema.value_columns().all(|c| {
        let a = incoming.get(&c.name).unwrap_or(&Value::Null);
        let b = current.columns.get(&c.name).unwrap_or(&Value::Null);
        a == b
    })
}

/// Build the plan. `current` is consumed; whatever is left over is missing from the snapshot.
pub fn plan(
    schema: &TableSchema,
    incoming: BTreeMap<RowKey, Row>,
    mut current: BTreeMap<RowKey, VersionedRow>,
    finality: RowFinality,
) -> UpsertPlan {
    let mut plan = UpsertPlan::default();
    for (key, row) in incoming {
        match current.remove(&key) {
            None => plan.inserts.push((key, row)),
            Some(existing) if values_equal(schema, &row, &existing) => plan.unchanged += 1,
            Some(existing) => plan.updates.push((row, existing)),
        }
    }
    if finality == RowFinality::Dropoff {
        plan.deletes = current.into_values().collect();
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use histdb_core::models::{ColumnDef, ColumnType};
    use histdb_core::time::{parse_ts, sentinel_max};

    fn schema() -> TableSchema {
        TableSchema::new(
            "t",
            &["k"],
            vec![ColumnDef::new("k", ColumnType::Int), ColumnDef::new("v", ColumnType::Float)],
        )
    }

    fn t0() -> DateTime<Utc> {
        parse_ts("2024-01-01T00:00:00Z").unwrap()
    }

    fn key(k: i64) -> RowKey {
        RowKey(vec![Value::Int(k)])
    }

    fn incoming(k: i64, v: Value) -> (RowKey, Row) {
        let row = [("k".to_string(), Value::Int(k)), ("v".to_string(), v)]
            .into_iter()
            .collect();
        (key(k), row)
    }

    fn current(k: i64, v: Value) -> (RowKey, VersionedRow) {
        let columns = [("v".to_string(), v)].into_iter().collect();
        (
            key(k),
            VersionedRow {
                key: key(k),
                columns,
                valid_from: t0(),
                valid_to: sentinel_max(),
            },
        )
    }

    #[test]
    fn classifies_new_changed_unchanged_missing() {
        let inc: BTreeMap<_, _> = [
            incoming(1, Value::Float(1.0)),
            incoming(2, Value::Float(2.5)),
            incoming(4, Value::Null),
        ]
        .into_iter()
        .collect();
        let cur: BTreeMap<_, _> = [
            current(1, Value::Float(1.0)),
            current(2, Value::Float(2.0)),
            current(3, Value::Float(3.0)),
        ]
        .into_iter()
        .collect();

        let p = plan(&schema(), inc.clone(), cur.clone(), RowFinality::Dropoff);
        assert_eq!(p.inserts.len(), 1);
        assert_eq!(p.inserts[0].0, key(4));
        assert_eq!(p.updates.len(), 1);
        assert_eq!(p.updates[0].1.key, key(2));
        assert_eq!(p.unchanged, 1);
        assert_eq!(p.deletes.len(), 1);
        assert_eq!(p.deletes[0].key, key(3));

        let p = plan(&schema(), inc, cur, RowFinality::Disabled);
        assert!(p.deletes.is_empty());
    }

    #[test]
    fn null_equals_null_and_differs_from_value() {
        let (_, null_cur) = current(1, Value::Null);
        let (_, null_row) = incoming(1, Value::Null);
        let (_, val_row) = incoming(1, Value::Float(0.0));
        assert!(values_equal(&schema(), &null_row, &null_cur));
        assert!(!values_equal(&schema(), &val_row, &null_cur));
    }
}
