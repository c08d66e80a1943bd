use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time::is_sentinel;

use super::value::{Row, RowKey};

/// One version of an entity: its values over `[valid_from, valid_to)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRow {
    pub key: RowKey,
    /// Non-key columns.
    pub columns: Row,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
}

impl VersionedRow {
    /// The open-ended version of its key.
    pub fn is_current(&self) -> bool {
        is_sentinel(&self.valid_to)
    }

    /// Whether this version was in force at `t`.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.valid_from <= t && t < self.valid_to
    }
}
