use std::fmt;

use serde::Serialize;

use histdb_core::models::UpsertCounts;

/// Observable position of a dataset run. Indices count units within an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Fetching(usize),
    Partitioning(usize),
    Applying(usize),
    Committing(usize),
    Failed(String),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Fetching(i) => write!(f, "fetching({i})"),
            Self::Partitioning(i) => write!(f, "partitioning({i})"),
            Self::Applying(i) => write!(f, "applying({i})"),
            Self::Committing(i) => write!(f, "committing({i})"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// What happened to one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Applied { counts: UpsertCounts, dropped: usize },
    /// The ledger already held the item; nothing was written.
    Duplicate,
}

/// Totals over every committed unit of a dataset run, across attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub units_applied: u64,
    pub duplicates: u64,
    pub rows_dropped: u64,
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub attempts: u32,
}

impl RunReport {
    pub(crate) fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Applied { counts, dropped } => {
                self.units_applied += 1;
                self.rows_dropped += *dropped as u64;
                self.inserted += counts.inserted;
                self.updated += counts.updated;
                self.deleted += counts.deleted;
            }
            UnitOutcome::Duplicate => self.duplicates += 1,
        }
    }

    /// Rows written across all units.
    pub fn written(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }
}
