//! Counters for rate resolution.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Resolution counters, updated lock-free.
#[derive(Debug, Default)]
pub struct FxMetrics {
    /// Requests answered from a fresh cache entry.
    pub cache_hits: AtomicU64,
    /// Requests answered by a direct upstream quote.
    pub direct_quotes: AtomicU64,
    /// Requests answered by an inverted quote.
    pub inverse_quotes: AtomicU64,
    /// Requests answered by triangulation.
    pub triangulated_quotes: AtomicU64,
    /// Requests answered with a stale cache entry.
    pub stale_served: AtomicU64,
    /// Requests for which no rate could be produced.
    pub unavailable: AtomicU64,
    /// Completed conversions.
    pub conversions: AtomicU64,
}

impl FxMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the counters.
    pub fn snapshot(&self) -> FxMetricsSnapshot {
        FxMetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            direct_quotes: self.direct_quotes.load(Ordering::Relaxed),
            inverse_quotes: self.inverse_quotes.load(Ordering::Relaxed),
            triangulated_quotes: self.triangulated_quotes.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            conversions: self.conversions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`FxMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FxMetricsSnapshot {
    pub cache_hits: u64,
    pub direct_quotes: u64,
    pub inverse_quotes: u64,
    pub triangulated_quotes: u64,
    pub stale_served: u64,
    pub unavailable: u64,
    pub conversions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = FxMetrics::new();
        FxMetrics::incr(&metrics.cache_hits);
        FxMetrics::incr(&metrics.stale_served);
        FxMetrics::incr(&metrics.triangulated_quotes);

        let snap = metrics.snapshot();
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.stale_served, 1);
        assert_eq!(snap.triangulated_quotes, 1);
        assert_eq!(snap.inverse_quotes, 0);
    }
}
