//! Exchange-rate caching with staleness tracking.

use chrono::{Duration, NaiveDate};
use dashmap::DashMap;
use moneta_common::{constants, is_older_than, CurrencyPair, ExchangeRate, Timestamp};
use tracing::debug;

/// Configuration for rate cache.
#[derive(Debug, Clone)]
pub struct RateCacheConfig {
    /// Age after which a spot rate is stale. Stale rates are still kept as a
    /// last-resort fallback.
    pub staleness_threshold: Duration,
    /// Age after which a spot rate may be evicted outright.
    pub hard_expiry: Duration,
    /// Maximum number of spot entries.
    pub max_entries: usize,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: constants::staleness_threshold(),
            hard_expiry: constants::hard_expiry(),
            max_entries: 10000,
        }
    }
}

/// Thread-safe rate cache keyed by currency pair.
///
/// Spot rates age against `staleness_threshold`; dated (historical) rates
/// never go stale and live in a separate map.
pub struct RateCache {
    spot: DashMap<CurrencyPair, ExchangeRate>,
    dated: DashMap<(CurrencyPair, NaiveDate), ExchangeRate>,
    config: RateCacheConfig,
}

impl RateCache {
    /// Create a new rate cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(RateCacheConfig::default())
    }

    /// Create a new rate cache with custom configuration.
    pub fn with_config(config: RateCacheConfig) -> Self {
        Self {
            spot: DashMap::new(),
            dated: DashMap::new(),
            config,
        }
    }

    /// Cache configuration.
    pub fn config(&self) -> &RateCacheConfig {
        &self.config
    }

    /// Get the cached rate for a pair, whatever its age.
    pub fn get(&self, pair: &CurrencyPair) -> Option<ExchangeRate> {
        let rate = self.spot.get(pair).map(|e| e.value().clone());
        if rate.is_none() {
            debug!(pair = %pair, "Cache miss");
        }
        rate
    }

    /// Get the cached rate only if it is still fresh at `at`.
    pub fn get_fresh(&self, pair: &CurrencyPair, at: Timestamp) -> Option<ExchangeRate> {
        let rate = self.get(pair)?;
        if self.is_stale(&rate, at) {
            debug!(pair = %pair, age_secs = rate.age(at).num_seconds(), "Cache entry stale");
            None
        } else {
            debug!(pair = %pair, "Cache hit");
            Some(rate)
        }
    }

    /// Whether a rate is older than the staleness threshold at `at`.
    pub fn is_stale(&self, rate: &ExchangeRate, at: Timestamp) -> bool {
        is_older_than(rate.timestamp, self.config.staleness_threshold, at)
    }

    /// Insert or replace the rate for its pair.
    pub fn put(&self, rate: ExchangeRate) {
        if self.spot.len() >= self.config.max_entries && !self.spot.contains_key(&rate.pair) {
            self.make_room(moneta_common::now());
        }
        self.spot.insert(rate.pair.clone(), rate);
    }

    /// Get a dated rate.
    pub fn get_dated(&self, pair: &CurrencyPair, date: NaiveDate) -> Option<ExchangeRate> {
        self.dated
            .get(&(pair.clone(), date))
            .map(|e| e.value().clone())
    }

    /// Insert a dated rate.
    pub fn put_dated(&self, date: NaiveDate, rate: ExchangeRate) {
        self.dated.insert((rate.pair.clone(), date), rate);
    }

    /// Remove a rate from cache.
    pub fn remove(&self, pair: &CurrencyPair) {
        self.spot.remove(pair);
    }

    /// Clear all cached rates.
    pub fn clear(&self) {
        self.spot.clear();
        self.dated.clear();
    }

    /// Get the number of spot entries in cache.
    pub fn len(&self) -> usize {
        self.spot.len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.spot.is_empty()
    }

    /// Evict spot entries past the hard expiry.
    pub fn evict_expired(&self, at: Timestamp) {
        let hard_expiry = self.config.hard_expiry;
        self.spot
            .retain(|_, rate| !is_older_than(rate.timestamp, hard_expiry, at));
    }

    /// Get cache statistics at `at`.
    pub fn stats(&self, at: Timestamp) -> CacheStats {
        let total = self.spot.len();
        let fresh = self
            .spot
            .iter()
            .filter(|e| !self.is_stale(e.value(), at))
            .count();

        CacheStats {
            total_entries: total,
            fresh_entries: fresh,
            stale_entries: total - fresh,
            dated_entries: self.dated.len(),
        }
    }

    fn make_room(&self, at: Timestamp) {
        self.evict_expired(at);
        if self.spot.len() < self.config.max_entries {
            return;
        }
        let oldest = self
            .spot
            .iter()
            .min_by_key(|e| e.value().timestamp)
            .map(|e| e.key().clone());
        if let Some(pair) = oldest {
            debug!(pair = %pair, "Evicting oldest entry to make room");
            self.spot.remove(&pair);
        }
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub stale_entries: usize,
    pub dated_entries: usize,
}
