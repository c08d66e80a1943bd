//! # histdb-temporal
//!
//! The versioning core of histdb:
//! - `upsert`: snapshot-diff reconciliation of an incoming row-set against the
//!   current view, producing closed history versions
//! - `partition`: bucketing of row streams into ordered application-time
//!   slices, with a per-stream watermark
//! - `query`: current view, as-of, per-key chains, history up to a time,
//!   and interval integrity checks
//! - `TemporalEngine`: facade over a shared `StorageEngine`

pub mod engine;
pub mod partition;
pub mod query;
pub mod upsert;

pub use engine::TemporalEngine;
pub use partition::{Bucket, Partitioned, TimePartitioner, Watermark};
