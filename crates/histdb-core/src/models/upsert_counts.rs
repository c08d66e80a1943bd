use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Outcome of one snapshot-diff application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertCounts {
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub unchanged: u64,
}

impl UpsertCounts {
    /// Rows that caused a write.
    pub fn written(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }
}

impl AddAssign for UpsertCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
        self.deleted += rhs.deleted;
        self.unchanged += rhs.unchanged;
    }
}
