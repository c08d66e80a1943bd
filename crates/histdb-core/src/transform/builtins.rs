//! Transforms every registry starts with.

use serde_json::Value as Json;

use crate::errors::{HistError, IngestError, HistResult};
use crate::models::{ColumnType, Row, Value};

use super::RowTransform;

pub const NULL_IF_GTE: &str = "null_if_gte";
pub const COMBINE_COLUMNS: &str = "combine_columns";
pub const APPLY_TYPE_CASTS: &str = "apply_type_casts";

fn arg_str(name: &str, args: &[Json], i: usize) -> HistResult<String> {
    args.get(i)
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| bad_args(name, format!("argument {i} must be a string")))
}

fn bad_args(name: &str, reason: String) -> HistError {
    IngestError::TransformFailed {
        name: name.to_string(),
        reason,
    }
    .into()
}

/// `null_if_gte(column, threshold)`: null out numeric values at or above a threshold.
pub struct NullIfGte {
    column: String,
    threshold: f64,
}

impl NullIfGte {
    pub fn from_args(args: &[Json]) -> HistResult<Box<dyn RowTransform>> {
        let column = arg_str(NULL_IF_GTE, args, 0)?;
        let threshold = args
            .get(1)
            .and_then(Json::as_f64)
            .ok_or_else(|| bad_args(NULL_IF_GTE, "argument 1 must be a number".into()))?;
        Ok(Box::new(Self { column, threshold }))
    }
}

impl RowTransform for NullIfGte {
    fn dependencies(&self) -> Vec<String> {
        vec![self.column.clone()]
    }

    fn apply(&self, mut rows: Vec<Row>) -> HistResult<Vec<Row>> {
        for row in &mut rows {
            if let Some(v) = row.get_mut(&self.column) {
                if v.as_f64().is_some_and(|x| x >= self.threshold) {
                    *v = Value::Null;
                }
            }
        }
        Ok(rows)
    }
}

enum Part {
    Literal(String),
    Column(String),
}

/// `combine_columns(target, part, ...)`: concatenate literals and `${column}` references.
///
/// A null referenced column makes the combined value null.
pub struct CombineColumns {
    target: String,
    parts: Vec<Part>,
}

impl CombineColumns {
    pub fn from_args(args: &[Json]) -> HistResult<Box<dyn RowTransform>> {
        let target = arg_str(COMBINE_COLUMNS, args, 0)?;
        let parts = (1..args.len())
            .map(|i| {
                let s = arg_str(COMBINE_COLUMNS, args, i)?;
                Ok(match s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
                    Some(col) => Part::Column(col.to_string()),
                    None => Part::Literal(s),
                })
            })
            .collect::<HistResult<Vec<_>>>()?;
        Ok(Box::new(Self { target, parts }))
    }
}

impl RowTransform for CombineColumns {
    fn dependencies(&self) -> Vec<String> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Column(c) => Some(c.clone()),
                Part::Literal(_) => None,
            })
            .collect()
    }

    fn apply(&self, mut rows: Vec<Row>) -> HistResult<Vec<Row>> {
        for row in &mut rows {
            let mut combined = String::new();
            let mut is_null = false;
            for part in &self.parts {
                match part {
                    Part::Literal(s) => combined.push_str(s),
                    Part::Column(c) => match row.get(c) {
                        Some(v) if !v.is_null() => combined.push_str(&v.to_string()),
                        _ => is_null = true,
                    },
                }
            }
            let value = if is_null { Value::Null } else { Value::Text(combined) };
            row.insert(self.target.clone(), value);
        }
        Ok(rows)
    }
}

/// `apply_type_casts(column, type, ...)`: coerce a column through one or more types in order.
pub struct ApplyTypeCasts {
    column: String,
    types: Vec<ColumnType>,
}

impl ApplyTypeCasts {
    pub fn from_args(args: &[Json]) -> HistResult<Box<dyn RowTransform>> {
        let column = arg_str(APPLY_TYPE_CASTS, args, 0)?;
        let types = (1..args.len())
            .map(|i| {
                let name = arg_str(APPLY_TYPE_CASTS, args, i)?;
                ColumnType::parse(&name)
                    .ok_or_else(|| bad_args(APPLY_TYPE_CASTS, format!("unknown type '{name}'")))
            })
            .collect::<HistResult<Vec<_>>>()?;
        Ok(Box::new(Self { column, types }))
    }
}

impl RowTransform for ApplyTypeCasts {
    fn dependencies(&self) -> Vec<String> {
        vec![self.column.clone()]
    }

    fn apply(&self, mut rows: Vec<Row>) -> HistResult<Vec<Row>> {
        for row in &mut rows {
            if let Some(v) = row.remove(&self.column) {
                let mut v = v;
                for ty in &self.types {
                    v = v.coerce(*ty).map_err(|reason| bad_args(APPLY_TYPE_CASTS, reason))?;
                }
                row.insert(self.column.clone(), v);
            }
        }
        Ok(rows)
    }
}
