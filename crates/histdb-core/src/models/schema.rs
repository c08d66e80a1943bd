//! Table schemas and batch conformance.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{HISTORY_SUFFIX, MAX_TABLE_NAME_LEN};
use crate::errors::{HistError, HistResult};

use super::value::{ColumnType, Row, RowKey, Value};

/// One column of a versioned table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// The column must be present in every incoming batch.
    #[serde(default)]
    pub required: bool,
    /// Filled in when the column is absent from an incoming row.
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_true() -> bool {
    true
}

impl ColumnDef {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: true,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Definition of a versioned table: its key and its columns (key columns included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub key_columns: Vec<String>,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: &str, key_columns: &[&str], columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.to_string(),
            key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
            columns,
        }
    }

    /// Name of the table holding closed versions.
    pub fn history_table(&self) -> String {
        format!("{}{}", self.name, HISTORY_SUFFIX)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.key_columns.iter().any(|k| k == name)
    }

    /// Non-key columns in declaration order.
    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !self.is_key_column(&c.name))
    }

    /// Key columns in key order.
    pub fn key_defs(&self) -> impl Iterator<Item = &ColumnDef> {
        self.key_columns.iter().filter_map(|k| self.column(k))
    }

    /// Check identifiers and key/column consistency.
    pub fn validate(&self) -> HistResult<()> {
        validate_identifier(&self.name)?;
        if self.name.len() + HISTORY_SUFFIX.len() > MAX_TABLE_NAME_LEN {
            return Err(HistError::ConfigError(format!(
                "table name '{}' is too long",
                self.name
            )));
        }
        if self.key_columns.is_empty() {
            return Err(HistError::ConfigError(format!(
                "table '{}' declares no key columns",
                self.name
            )));
        }
        let mut seen = BTreeSet::new();
        for col in &self.columns {
            validate_identifier(&col.name)?;
            if col.name.starts_with("__") {
                return Err(HistError::ConfigError(format!(
                    "column '{}' uses the reserved '__' prefix",
                    col.name
                )));
            }
            if !seen.insert(col.name.as_str()) {
                return Err(HistError::ConfigError(format!(
                    "duplicate column '{}' in table '{}'",
                    col.name, self.name
                )));
            }
        }
        for key in &self.key_columns {
            if !seen.contains(key.as_str()) {
                return Err(HistError::ConfigError(format!(
                    "key column '{key}' is not a column of '{}'",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Conform an incoming batch to this schema.
    ///
    /// Required columns must appear somewhere in the batch; absent columns take
    /// their default (or null); values are coerced to the declared types;
    /// keys must be complete and non-null columns must hold values. Columns the
    /// schema does not know are dropped.
    pub fn conform(&self, rows: Vec<Row>) -> HistResult<Vec<Row>> {
        if !rows.is_empty() {
            let missing: Vec<&str> = self
                .columns
                .iter()
                .filter(|c| c.required && !rows.iter().any(|r| r.contains_key(&c.name)))
                .map(|c| c.name.as_str())
                .collect();
            if !missing.is_empty() {
                return Err(HistError::ValidationFailure(format!(
                    "required columns {missing:?} not found in batch for '{}'",
                    self.name
                )));
            }
        }

        rows.into_iter()
            .enumerate()
            .map(|(i, mut row)| {
                let mut out = Row::new();
                for col in &self.columns {
                    let raw = row
                        .remove(&col.name)
                        .or_else(|| col.default.clone())
                        .unwrap_or(Value::Null);
                    let value = raw.coerce(col.column_type).map_err(|e| {
                        HistError::ValidationFailure(format!(
                            "row {i}, column '{}' of '{}': {e}",
                            col.name, self.name
                        ))
                    })?;
                    if value.is_null() && (!col.nullable || self.is_key_column(&col.name)) {
                        return Err(HistError::ValidationFailure(format!(
                            "row {i}: column '{}' of '{}' may not be null",
                            col.name, self.name
                        )));
                    }
                    out.insert(col.name.clone(), value);
                }
                Ok(out)
            })
            .collect()
    }

    /// Key of a conformed row.
    pub fn key_of(&self, row: &Row) -> HistResult<RowKey> {
        RowKey::from_row(row, &self.key_columns).ok_or_else(|| {
            HistError::ValidationFailure(format!("row has an incomplete key for '{}'", self.name))
        })
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*`; everything interpolated into SQL goes through here.
pub fn validate_identifier(name: &str) -> HistResult<()> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(HistError::ConfigError(format!("invalid identifier '{name}'")))
    }
}
