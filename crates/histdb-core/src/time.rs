//! Timestamp encoding helpers.
//!
//! Timestamps are stored as fixed-width UTC text so that lexical order in
//! SQLite equals chronological order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};

use crate::constants::SENTINEL_MAX_MICROS;

/// Storage format: always six fractional digits, always `Z`.
pub const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format a timestamp in the storage format.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// Drop sub-microsecond precision, which the storage format cannot hold.
pub fn truncate_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Parse a timestamp from RFC 3339 or a handful of naive (UTC-assumed) layouts.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// The open-interval sentinel as a timestamp.
pub fn sentinel_max() -> DateTime<Utc> {
    DateTime::from_timestamp_micros(SENTINEL_MAX_MICROS).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether `ts` is the open-interval sentinel.
pub fn is_sentinel(ts: &DateTime<Utc>) -> bool {
    ts.timestamp_micros() >= SENTINEL_MAX_MICROS
}
