//! Incoming-batch deduplication by key.

use std::collections::{BTreeMap, HashMap};

use histdb_core::models::{Row, RowKey, TableSchema, UniqueStrategy};
use histdb_core::HistResult;

/// Drop each row identical to the previous occurrence of its key.
///
/// Order-sensitive: `a, a, b, a` for one key keeps `a, b, a`, so with
/// `UniqueStrategy::Last` the last differing value wins.
pub fn drop_unchanged_rows(schema: &TableSchema, rows: Vec<Row>) -> HistResult<Vec<Row>> {
    let mut previous: HashMap<RowKey, Row> = HashMap::new();
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows {
        let key = schema.key_of(&row)?;
        if previous.get(&key) == Some(&row) {
            continue;
        }
        previous.insert(key, row.clone());
        kept.push(row);
    }
    Ok(kept)
}

/// One row per key, choosing the first or last occurrence.
pub fn unique_by_key(
    schema: &TableSchema,
    rows: Vec<Row>,
    strategy: UniqueStrategy,
) -> HistResult<BTreeMap<RowKey, Row>> {
    let mut unique = BTreeMap::new();
    for row in rows {
        let key = schema.key_of(&row)?;
        match strategy {
            UniqueStrategy::First => {
                unique.entry(key).or_insert(row);
            }
            UniqueStrategy::Last => {
                unique.insert(key, row);
            }
        }
    }
    Ok(unique)
}
