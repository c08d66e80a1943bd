//! Decoding raw payloads into rows.

use serde_json::Value as Json;

use histdb_core::errors::IngestError;
use histdb_core::models::{Row, Value};
use histdb_core::{HistError, HistResult};

/// Turns the bytes of one source item into rows.
pub trait RowLoader: Send + Sync {
    fn load(&self, locator: &str, bytes: &[u8]) -> HistResult<Vec<Row>>;
}

/// Reads a JSON array of records, a columnar object (`{"col": [..], ..}`),
/// a single record, or newline-delimited records.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRowLoader;

impl RowLoader for JsonRowLoader {
    fn load(&self, locator: &str, bytes: &[u8]) -> HistResult<Vec<Row>> {
        let decode_err = |reason: String| IngestError::SourceDecode {
            locator: locator.to_string(),
            reason,
        };
        let text = std::str::from_utf8(bytes).map_err(|e| decode_err(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Json>(text) {
            Ok(doc) => rows_from_json(&doc).map_err(|e| HistError::from(decode_err(e))),
            Err(whole) => {
                let mut rows = Vec::new();
                for (n, line) in text.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let record: Json = serde_json::from_str(line).map_err(|e| {
                        decode_err(format!("not JSON ({whole}); line {}: {e}", n + 1))
                    })?;
                    rows.push(record_to_row(&record).map_err(decode_err)?);
                }
                Ok(rows)
            }
        }
    }
}

/// Decode one JSON document into rows.
pub fn rows_from_json(doc: &Json) -> Result<Vec<Row>, String> {
    match doc {
        Json::Array(records) => records.iter().map(record_to_row).collect(),
        Json::Object(map) if !map.is_empty() && map.values().all(Json::is_array) => {
            columnar_to_rows(map)
        }
        Json::Object(_) => Ok(vec![record_to_row(doc)?]),
        Json::Null => Ok(Vec::new()),
        other => Err(format!("expected records, found {other}")),
    }
}

fn record_to_row(record: &Json) -> Result<Row, String> {
    let Json::Object(map) = record else {
        return Err(format!("record is not an object: {record}"));
    };
    map.iter()
        .map(|(col, v)| Value::from_json(v).map(|v| (col.clone(), v)))
        .collect()
}

fn columnar_to_rows(map: &serde_json::Map<String, Json>) -> Result<Vec<Row>, String> {
    let mut len = None;
    for (col, values) in map {
        let n = values.as_array().map_or(0, Vec::len);
        match len {
            None => len = Some(n),
            Some(expected) if expected != n => {
                return Err(format!("column '{col}' has {n} values, expected {expected}"));
            }
            Some(_) => {}
        }
    }
    let mut rows = vec![Row::new(); len.unwrap_or(0)];
    for (col, values) in map {
        for (row, v) in rows.iter_mut().zip(values.as_array().into_iter().flatten()) {
            row.insert(col.clone(), Value::from_json(v)?);
        }
    }
    Ok(rows)
}
