//! Interval invariants of version chains.

use histdb_core::errors::TemporalError;
use histdb_core::models::VersionedRow;
use histdb_core::HistResult;

/// Verify, per key: every interval is non-empty, intervals do not overlap,
/// and at most one version (the latest) is open.
///
/// `versions` may hold several keys in any order.
pub fn check_interval_integrity(versions: &[VersionedRow]) -> HistResult<()> {
    let mut sorted: Vec<&VersionedRow> = versions.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key).then(a.valid_from.cmp(&b.valid_from)));

    for v in &sorted {
        if v.valid_from >= v.valid_to {
            return Err(TemporalError::InvalidInterval(format!(
                "key {}: empty interval [{}, {})",
                v.key, v.valid_from, v.valid_to
            ))
            .into());
        }
    }

    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.key != next.key {
            continue;
        }
        if prev.is_current() {
            return Err(TemporalError::InvalidInterval(format!(
                "key {}: open version at {} is followed by another at {}",
                prev.key, prev.valid_from, next.valid_from
            ))
            .into());
        }
        if prev.valid_to > next.valid_from {
            return Err(TemporalError::InvalidInterval(format!(
                "key {}: [{}, {}) overlaps version starting {}",
                prev.key, prev.valid_from, prev.valid_to, next.valid_from
            ))
            .into());
        }
    }
    Ok(())
}
