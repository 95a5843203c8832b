// Timestamp and visible-range domain models
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Instant on a time axis, stored as nanoseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("invalid timestamp {input:?}: {source}")]
    Parse {
        input: String,
        source: chrono::ParseError,
    },
    #[error("timestamp {0} does not fit in 64-bit nanoseconds")]
    OutOfRange(DateTime<Utc>),
}

impl Timestamp {
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Result<Self, TimestampError> {
        datetime
            .timestamp_nanos_opt()
            .map(Self)
            .ok_or(TimestampError::OutOfRange(datetime))
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.0)
    }

    pub fn parse_rfc3339(input: &str) -> Result<Self, TimestampError> {
        let parsed = DateTime::parse_from_rfc3339(input).map_err(|source| TimestampError::Parse {
            input: input.to_string(),
            source,
        })?;
        Self::from_datetime(parsed.with_timezone(&Utc))
    }

    /// RFC 3339 in UTC; fractional digits only appear when the instant has them.
    pub fn to_rfc3339(self) -> String {
        self.to_datetime().to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn epoch_millis(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Inverse of [`Timestamp::epoch_millis`], rounded to the nearest nanosecond.
    pub fn from_epoch_millis(millis: f64) -> Option<Self> {
        let nanos = (millis * 1_000_000.0).round();
        (nanos.is_finite() && nanos >= i64::MIN as f64 && nanos < i64::MAX as f64)
            .then(|| Self(nanos as i64))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

/// Inclusive visible window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, t: Timestamp) -> bool {
        self.start <= t && t <= self.end
    }

    /// Row indices of `datetime` (sorted ascending) that fall inside the range.
    /// Two binary searches, so the cost does not depend on rows outside the window.
    pub fn row_span(&self, datetime: &[Timestamp]) -> Range<usize> {
        let lo = datetime.partition_point(|t| *t < self.start);
        let hi = datetime.partition_point(|t| *t <= self.end);
        lo..hi.max(lo)
    }
}
