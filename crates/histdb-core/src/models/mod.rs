mod audit_entry;
mod delta_policy;
mod schema;
mod source_item;
mod time_partition;
mod upsert_counts;
mod value;
mod versioned_row;

pub use audit_entry::AuditEntry;
pub use delta_policy::{DeltaPolicy, RowFinality, UniqueStrategy};
pub use schema::{validate_identifier, ColumnDef, TableSchema};
pub use source_item::{SourceItem, SourceKind};
pub use time_partition::{BucketInterval, BucketStrategy, TimePartitionSpec};
pub use upsert_counts::UpsertCounts;
pub use value::{ColumnType, Row, RowKey, Value};
pub use versioned_row::VersionedRow;
