//! # histdb-ingest
//!
//! Pulls units of input from sources and folds them into versioned tables.
//!
//! A spawned producer task owns the source and hands out one `SourceUnit` per
//! demand. For each unit the coordinator transforms, partitions, and applies
//! every bucket in one write transaction together with the unit's audit entry,
//! then runs the unit's commit callback once the transaction is durable.

pub mod coordinator;
pub mod source;

pub use coordinator::{DatasetRun, IngestionCoordinator, RunReport, RunState, UnitOutcome};
pub use source::{
    commit_fn, noop_commit, AckLog, ChannelSource, CommitContext, CommitFn, FileSource,
    InputSource, JsonRowLoader, RowLoader, SourceUnit, StreamMessage,
};
