//! Clock abstraction for event timestamps.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// Source of UTC timestamps stamped onto new events.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock, truncated to
/// microseconds so timestamps survive a `TIMESTAMPTZ` round trip unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        now.duration_trunc(TimeDelta::microseconds(1)).unwrap_or(now)
    }
}
