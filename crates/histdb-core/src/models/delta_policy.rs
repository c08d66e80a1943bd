use serde::{Deserialize, Serialize};

/// How a key missing from an incoming snapshot is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowFinality {
    /// Absent keys are deleted: their current row is closed.
    #[default]
    Dropoff,
    /// Absent keys are left untouched.
    Disabled,
}

/// Which occurrence wins when a key repeats within one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueStrategy {
    First,
    #[default]
    Last,
}

/// Governs snapshot-diff reconciliation for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaPolicy {
    pub row_finality: RowFinality,
    pub unique_strategy: UniqueStrategy,
    /// Drop rows identical to the previous occurrence of the same key before deduplicating.
    pub drop_unchanged_rows: bool,
}
