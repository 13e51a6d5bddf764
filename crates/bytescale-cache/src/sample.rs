//! A single timestamped reading of a cumulative counter.

use chrono::{DateTime, TimeDelta, Utc};

/// A counter value together with the instant it was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSample {
    /// When the sample was taken (UTC).
    pub timestamp: DateTime<Utc>,
    /// Cumulative counter value as reported upstream.
    pub value: i64,
}

impl MetricSample {
    /// Create a sample observed at `timestamp`.
    pub fn new(value: i64, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, value }
    }

    /// Create a sample observed now.
    pub fn now(value: i64) -> Self {
        Self::new(value, Utc::now())
    }

    /// Age of the sample relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.timestamp)
    }

    /// Whether the sample is strictly older than `window` at `now`.
    ///
    /// A sample exactly `window` old is not expired.
    pub fn is_expired(&self, window: TimeDelta, now: DateTime<Utc>) -> bool {
        self.age(now) > window
    }
}
