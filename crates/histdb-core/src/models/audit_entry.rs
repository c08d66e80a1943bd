use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::source_item::SourceKind;

/// A persisted record that a source item was applied to a table.
///
/// Unique on `(table_name, source_kind, locator, source_time)`. Append-only:
/// entries are never updated and only removed by an explicit purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: i64,
    pub table_name: String,
    pub source_kind: SourceKind,
    pub locator: String,
    pub source_time: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}
