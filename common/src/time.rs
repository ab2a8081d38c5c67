//! Time utilities and constants for the Moneta engine.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Engine timing constants.
pub mod constants {
    use super::Duration;

    /// Age after which a spot rate is considered stale (1 hour).
    pub fn staleness_threshold() -> Duration {
        Duration::hours(1)
    }

    /// Age after which a cached rate may be evicted outright (24 hours).
    pub fn hard_expiry() -> Duration {
        Duration::hours(24)
    }

    /// Upstream fetch timeout (5 seconds).
    pub fn fetch_timeout() -> Duration {
        Duration::seconds(5)
    }

    /// Maximum payoff simulation horizon, in months (50 years).
    pub const MAX_HORIZON_MONTHS: u32 = 600;
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// True when `timestamp` is older than `max_age` at `at`.
pub fn is_older_than(timestamp: Timestamp, max_age: Duration, at: Timestamp) -> bool {
    at.signed_duration_since(timestamp) > max_age
}

/// Every calendar day in `[start, end]`, ascending. Empty when `start > end`.
pub fn days_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> + Clone {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
