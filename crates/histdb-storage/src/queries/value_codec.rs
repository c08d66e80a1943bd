//! Mapping between `Value` and SQLite storage classes.

use rusqlite::types::{Value as SqlValue, ValueRef};

use histdb_core::models::{ColumnType, Value};
use histdb_core::time::format_ts;

/// Bools as 0/1, timestamps as fixed-width UTC text.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Timestamp(ts) => SqlValue::Text(format_ts(ts)),
    }
}

/// Decode a stored cell as `ty`.
pub fn from_sql(raw: ValueRef<'_>, ty: ColumnType) -> Result<Value, String> {
    let value = match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(
            std::str::from_utf8(bytes)
                .map_err(|e| format!("invalid UTF-8: {e}"))?
                .to_string(),
        ),
        ValueRef::Blob(_) => return Err("unexpected BLOB".to_string()),
    };
    value.coerce(ty)
}
