//! FX engine configuration.

use std::time::Duration;

use moneta_common::{constants, Currency, DurationExt};

use crate::cache::RateCacheConfig;

/// Configuration for the FX engine.
#[derive(Debug, Clone)]
pub struct FxEngineConfig {
    /// Cache configuration.
    pub cache: RateCacheConfig,
    /// Common currency used to triangulate pairs without a direct quote.
    pub base_currency: Currency,
    /// Upper bound on a single upstream fetch.
    pub fetch_timeout: Duration,
    /// Maximum entries resolved concurrently in batch and series operations.
    pub max_concurrency: usize,
}

impl Default for FxEngineConfig {
    fn default() -> Self {
        Self {
            cache: RateCacheConfig::default(),
            base_currency: Currency::usd(),
            fetch_timeout: constants::fetch_timeout().as_std(),
            max_concurrency: 8,
        }
    }
}

impl FxEngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secs) = std::env::var("MONETA_STALENESS_SECS") {
            if let Ok(secs) = secs.parse() {
                config.cache.staleness_threshold = chrono::Duration::seconds(secs);
            }
        }

        if let Ok(code) = std::env::var("MONETA_BASE_CURRENCY") {
            if let Ok(currency) = Currency::parse(&code) {
                config.base_currency = currency;
            }
        }

        if let Ok(ms) = std::env::var("MONETA_FETCH_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.fetch_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(n) = std::env::var("MONETA_MAX_CONCURRENCY") {
            if let Ok(n) = n.parse() {
                config.max_concurrency = n;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.staleness_threshold <= chrono::Duration::zero() {
            return Err("Staleness threshold must be positive".to_string());
        }

        if self.cache.hard_expiry < self.cache.staleness_threshold {
            return Err("Hard expiry cannot be shorter than the staleness threshold".to_string());
        }

        if self.cache.max_entries == 0 {
            return Err("Cache must hold at least one entry".to_string());
        }

        if self.fetch_timeout.is_zero() {
            return Err("Fetch timeout cannot be 0".to_string());
        }

        if self.max_concurrency == 0 {
            return Err("Max concurrency cannot be 0".to_string());
        }

        Ok(())
    }
}
