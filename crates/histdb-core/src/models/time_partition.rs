//! Time partitioning settings and bucket arithmetic.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{HistError, TemporalError};

use super::delta_policy::UniqueStrategy;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_WEEK: i64 = 7 * 86_400 * MICROS_PER_SECOND;
/// 1970-01-05 was the first Monday after the epoch; week buckets start on Mondays.
const MONDAY_OFFSET_MICROS: i64 = 4 * 86_400 * MICROS_PER_SECOND;

/// A fixed bucket width, written as e.g. `"30s"`, `"15m"`, `"1h"`, `"1d"`, `"1w"`, `"1h30m"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketInterval {
    micros: i64,
}

impl BucketInterval {
    pub fn from_duration(d: Duration) -> Result<Self, HistError> {
        match d.num_microseconds() {
            Some(micros) if micros > 0 => Ok(Self { micros }),
            _ => Err(TemporalError::InvalidBucketInterval(format!("{d} is not positive")).into()),
        }
    }

    pub fn parse(s: &str) -> Result<Self, HistError> {
        let invalid = || HistError::from(TemporalError::InvalidBucketInterval(s.to_string()));
        let mut total: i64 = 0;
        let mut digits = String::new();
        for c in s.trim().chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let n: i64 = digits.parse().map_err(|_| invalid())?;
            digits.clear();
            let unit = match c {
                's' => MICROS_PER_SECOND,
                'm' => 60 * MICROS_PER_SECOND,
                'h' => 3_600 * MICROS_PER_SECOND,
                'd' => 86_400 * MICROS_PER_SECOND,
                'w' => MICROS_PER_WEEK,
                _ => return Err(invalid()),
            };
            total = n
                .checked_mul(unit)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(invalid)?;
        }
        if !digits.is_empty() || total <= 0 {
            return Err(invalid());
        }
        Ok(Self { micros: total })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::microseconds(self.micros)
    }

    /// Floor `ts` to the start of its bucket (epoch-aligned; weeks align to Monday).
    pub fn truncate(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let offset = if self.micros % MICROS_PER_WEEK == 0 {
            MONDAY_OFFSET_MICROS
        } else {
            0
        };
        let t = ts.timestamp_micros() - offset;
        let floored = t.div_euclid(self.micros) * self.micros + offset;
        DateTime::from_timestamp_micros(floored).unwrap_or(ts)
    }
}

impl TryFrom<String> for BucketInterval {
    type Error = HistError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<BucketInterval> for String {
    fn from(b: BucketInterval) -> Self {
        b.to_string()
    }
}

impl fmt::Display for BucketInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.micros;
        for (unit, micros) in [
            ("w", MICROS_PER_WEEK),
            ("d", 86_400 * MICROS_PER_SECOND),
            ("h", 3_600 * MICROS_PER_SECOND),
            ("m", 60 * MICROS_PER_SECOND),
            ("s", MICROS_PER_SECOND),
        ] {
            if rest >= micros {
                write!(f, "{}{unit}", rest / micros)?;
                rest %= micros;
            }
        }
        if rest > 0 {
            // Sub-second widths only arise from `from_duration`.
            write!(f, "{}s", rest as f64 / MICROS_PER_SECOND as f64)?;
        }
        Ok(())
    }
}

/// Whether a bucket is labelled by its start or its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketStrategy {
    RoundUp,
    #[default]
    RoundDown,
}

/// How an unbounded row stream is cut into application-time slices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePartitionSpec {
    pub time_column: String,
    pub bucket_interval: BucketInterval,
    #[serde(default)]
    pub bucket_strategy: BucketStrategy,
    #[serde(default)]
    pub unique_strategy: UniqueStrategy,
    #[serde(default)]
    pub filter_past_events: bool,
}

impl TimePartitionSpec {
    /// Label of the bucket containing `ts`.
    pub fn bucket_time(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let start = self.bucket_interval.truncate(ts);
        match self.bucket_strategy {
            BucketStrategy::RoundDown => start,
            BucketStrategy::RoundUp => start + self.bucket_interval.as_duration(),
        }
    }

    /// Offset between a bucket label and the start of the bucket.
    pub fn round_up_offset(&self) -> Duration {
        match self.bucket_strategy {
            BucketStrategy::RoundDown => Duration::zero(),
            BucketStrategy::RoundUp => self.bucket_interval.as_duration(),
        }
    }
}
