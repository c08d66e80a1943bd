//! Per-dataset configuration: target table, delta policy, partitioning, transforms.

use serde::{Deserialize, Serialize};

use crate::errors::{HistError, HistResult};
use crate::models::{validate_identifier, DeltaPolicy, TableSchema, TimePartitionSpec};
use crate::transform::TransformSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub table: TableSchema,
    #[serde(default)]
    pub delta: DeltaPolicy,
    #[serde(default)]
    pub time_partition: Option<TimePartitionSpec>,
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
    /// Maximum number of source units per run.
    #[serde(default)]
    pub scrape_limit: Option<usize>,
}

impl DatasetConfig {
    pub fn new(name: &str, table: TableSchema) -> Self {
        Self {
            name: name.to_string(),
            table,
            delta: DeltaPolicy::default(),
            time_partition: None,
            transforms: Vec::new(),
            scrape_limit: None,
        }
    }

    pub fn validate(&self) -> HistResult<()> {
        validate_identifier(&self.name)?;
        self.table.validate()?;
        if let Some(tp) = &self.time_partition {
            if tp.time_column.is_empty() {
                return Err(HistError::ConfigError(format!(
                    "dataset '{}' has a time partition without a time column",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
