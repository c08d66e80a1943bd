//! Cell values, column types, rows and row keys.
//!
//! Equality is value-exact: floats compare by `total_cmp`, so there is no
//! tolerance, and `Null == Null`. The same total order makes `RowKey`
//! sortable, which keeps history queries deterministic.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::{format_ts, parse_ts, truncate_micros};

/// A single cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// A row as a column-name → value map.
pub type Row = BTreeMap<String, Value>;

/// Declared type of a column; drives coercion, SQL affinity, and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Text,
    Timestamp,
}

impl ColumnType {
    /// SQLite column declaration for this type.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Bool | Self::Int => "INTEGER",
            Self::Float => "REAL",
            Self::Text | Self::Timestamp => "TEXT",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Some(Self::Bool),
            "int" | "int64" | "integer" => Some(Self::Int),
            "float" | "float64" | "double" | "real" => Some(Self::Float),
            "text" | "str" | "string" | "utf8" | "varchar" => Some(Self::Text),
            "timestamp" | "datetime" => Some(Self::Timestamp),
            _ => None,
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::Text(_) => 4,
            Self::Timestamp(_) => 5,
        }
    }

    /// Numeric view used by threshold transforms.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Timestamp view; integers are epoch seconds, as in `coerce`.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(truncate_micros(*ts)),
            Self::Text(s) => parse_ts(s).map(truncate_micros),
            Self::Int(secs) => DateTime::from_timestamp(*secs, 0),
            _ => None,
        }
    }

    /// The form a value takes after a round trip through storage.
    ///
    /// NaN becomes null, `-0.0` becomes `0.0`, timestamps keep microseconds.
    pub fn canonical(self) -> Value {
        match self {
            Self::Float(f) if f.is_nan() => Self::Null,
            Self::Float(f) if f == 0.0 => Self::Float(0.0),
            Self::Timestamp(ts) => Self::Timestamp(truncate_micros(ts)),
            other => other,
        }
    }

    /// Convert into the representation of `ty`, in canonical form. Lossy
    /// conversions are refused.
    pub fn coerce(self, ty: ColumnType) -> Result<Value, String> {
        let coerced = match (ty, self) {
            (_, Self::Null) => Self::Null,

            (ColumnType::Bool, v @ Self::Bool(_)) => v,
            (ColumnType::Bool, Self::Int(0)) => Self::Bool(false),
            (ColumnType::Bool, Self::Int(1)) => Self::Bool(true),
            (ColumnType::Bool, Self::Text(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Self::Bool(true),
                "false" | "f" | "0" => Self::Bool(false),
                _ => return Err(format!("'{s}' is not a bool")),
            },

            (ColumnType::Int, v @ Self::Int(_)) => v,
            (ColumnType::Int, Self::Bool(b)) => Self::Int(i64::from(b)),
            (ColumnType::Int, Self::Float(f))
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
            {
                Self::Int(f as i64)
            }
            (ColumnType::Int, Self::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Self::Int)
                .map_err(|e| format!("'{s}' is not an int: {e}"))?,

            (ColumnType::Float, v @ Self::Float(_)) => v,
            (ColumnType::Float, Self::Int(i)) => Self::Float(i as f64),
            (ColumnType::Float, Self::Text(s)) => s
                .trim()
                .parse::<f64>()
                .map(Self::Float)
                .map_err(|e| format!("'{s}' is not a float: {e}"))?,

            (ColumnType::Text, v @ Self::Text(_)) => v,
            (ColumnType::Text, other) => Self::Text(other.to_string()),

            (ColumnType::Timestamp, v @ Self::Timestamp(_)) => v,
            (ColumnType::Timestamp, Self::Text(s)) => {
                parse_ts(&s).map(Self::Timestamp).ok_or_else(|| format!("'{s}' is not a timestamp"))?
            }
            (ColumnType::Timestamp, Self::Int(secs)) => DateTime::from_timestamp(secs, 0)
                .map(Self::Timestamp)
                .ok_or_else(|| format!("{secs} is out of timestamp range"))?,

            (ty, other) => return Err(format!("cannot convert {other} to {ty:?}")),
        };
        Ok(coerced.canonical())
    }

    /// Convert a JSON scalar. Arrays and objects are rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, String> {
        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .ok_or_else(|| format!("unrepresentable number {n}")),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            other => Err(format!("nested JSON is not a cell value: {other}")),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Timestamp(ts) => f.write_str(&format_ts(ts)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Ordered tuple of primary-key values identifying an entity within a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey(pub Vec<Value>);

impl RowKey {
    /// Extract the key of `row`; `None` when any key column is absent or null.
    pub fn from_row(row: &Row, key_columns: &[String]) -> Option<Self> {
        key_columns
            .iter()
            .map(|c| row.get(c).filter(|v| !v.is_null()).cloned())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str(")")
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Timestamp(ts) => ts.hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equals_null_but_not_a_value() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Float(0.0));
    }

    #[test]
    fn float_equality_has_no_tolerance() {
        assert_eq!(Value::Float(100.1), Value::Float(100.1));
        assert_ne!(Value::Float(100.1), Value::Float(100.100_000_000_001));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn int_does_not_equal_float() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Int(1).coerce(ColumnType::Float).unwrap(), Value::Float(1.0));
    }

    #[test]
    fn coerce_rejects_lossy_int() {
        assert!(Value::Float(1.5).coerce(ColumnType::Int).is_err());
        assert_eq!(Value::Float(2.0).coerce(ColumnType::Int).unwrap(), Value::Int(2));
    }

    #[test]
    fn coerce_refuses_values_past_i64_range() {
        assert!(Value::Float(9_223_372_036_854_775_808.0).coerce(ColumnType::Int).is_err());
    }

    #[test]
    fn coerce_yields_the_stored_form() {
        assert_eq!(Value::Float(f64::NAN).coerce(ColumnType::Float).unwrap(), Value::Null);
        assert_eq!(Value::from("NaN").coerce(ColumnType::Float).unwrap(), Value::Null);
        assert_eq!(Value::Float(-0.0).coerce(ColumnType::Float).unwrap(), Value::Float(0.0));
        let v = Value::from("2024-01-01T00:00:00.123456789Z")
            .coerce(ColumnType::Timestamp)
            .unwrap();
        assert_eq!(v, Value::from("2024-01-01T00:00:00.123456Z").coerce(ColumnType::Timestamp).unwrap());
    }

    #[test]
    fn epoch_seconds_read_as_timestamps() {
        assert_eq!(
            Value::Int(0).as_timestamp(),
            Value::from("1970-01-01T00:00:00Z").as_timestamp()
        );
    }

    #[test]
    fn coerce_text_to_timestamp() {
        let v = Value::from("1985-01-01T00:00:01Z").coerce(ColumnType::Timestamp).unwrap();
        assert!(matches!(v, Value::Timestamp(_)));
        assert!(Value::from("soon").coerce(ColumnType::Timestamp).is_err());
    }

    #[test]
    fn row_key_requires_every_key_column() {
        let mut row = Row::new();
        row.insert("id".into(), Value::Int(1));
        let keys = vec!["id".to_string(), "region".to_string()];
        assert!(RowKey::from_row(&row, &keys).is_none());
        row.insert("region".into(), Value::Null);
        assert!(RowKey::from_row(&row, &keys).is_none());
        row.insert("region".into(), Value::from("eu"));
        assert_eq!(
            RowKey::from_row(&row, &keys).unwrap(),
            RowKey(vec![Value::Int(1), Value::from("eu")])
        );
    }

    #[test]
    fn keys_sort_across_types_deterministically() {
        let mut keys = vec![
            RowKey(vec![Value::from("b")]),
            RowKey(vec![Value::Int(2)]),
            RowKey(vec![Value::Int(1)]),
        ];
        keys.sort();
        assert_eq!(keys[0], RowKey(vec![Value::Int(1)]));
        assert_eq!(keys[2], RowKey(vec![Value::from("b")]));
    }
}
