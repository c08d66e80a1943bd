use chrono::{DateTime, Utc};

/// Latest bucket boundary already emitted for one stream.
///
/// Starts at "zero" (admits everything) and only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark {
    value: Option<DateTime<Utc>>,
}

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a known position, e.g. the ledger's latest `source_time`.
    pub fn seeded(at: DateTime<Utc>) -> Self {
        Self { value: Some(at) }
    }

    pub fn get(&self) -> Option<DateTime<Utc>> {
        self.value
    }

    /// Whether a row stamped `ts` is strictly after the watermark.
    pub fn admits(&self, ts: DateTime<Utc>) -> bool {
        self.value.map_or(true, |w| ts > w)
    }

    /// Move forward to `to`. Returns `false` (and stays put) if `to` is not ahead.
    pub fn advance(&mut self, to: DateTime<Utc>) -> bool {
        if self.admits(to) {
            self.value = Some(to);
            true
        } else {
            false
        }
    }
}
