//! Main FX engine implementation.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use moneta_common::{now, Currency, CurrencyPair, Money};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cache::{CacheStats, RateCache};
use crate::config::FxEngineConfig;
use crate::conversion::{BatchEntry, ConversionRequest, ConversionResult};
use crate::detector::{CurrencyDetector, DetectorStats};
use crate::error::FxResult;
use crate::history::{HistoricalRates, HistoricalSeries};
use crate::metrics::{FxMetrics, FxMetricsSnapshot};
use crate::provider::RateProvider;
use crate::resolver::{RateQuote, RateResolver};

/// The main FX engine.
pub struct FxEngine {
    resolver: Arc<RateResolver>,
    cache: Arc<RateCache>,
    detector: CurrencyDetector,
    config: FxEngineConfig,
}

impl FxEngine {
    /// Create a new FX engine with the given provider.
    ///
    /// A `max_concurrency` of zero is raised to one.
    pub fn new(provider: Arc<dyn RateProvider>, mut config: FxEngineConfig) -> Self {
        if config.max_concurrency == 0 {
            warn!("max_concurrency of 0 would stall batches, using 1");
            config.max_concurrency = 1;
        }
        let cache = Arc::new(RateCache::with_config(config.cache.clone()));
        let resolver = Arc::new(RateResolver::new(provider, Arc::clone(&cache), &config));
        Self {
            resolver,
            cache,
            detector: CurrencyDetector::new(),
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &FxEngineConfig {
        &self.config
    }

    /// Get the current rate between two currencies.
    pub async fn get_rate(&self, from: &Currency, to: &Currency) -> FxResult<RateQuote> {
        let pair = CurrencyPair::new(from.clone(), to.clone());
        self.resolver.resolve(&pair).await
    }

    /// Get the current rate for a pair given as raw codes.
    pub async fn get_rate_for_codes(&self, from: &str, to: &str) -> FxResult<RateQuote> {
        let pair = CurrencyPair::parse(from, to)?;
        self.resolver.resolve(&pair).await
    }

    /// Get rates for several pairs, in request order. Each slot fails on its
    /// own.
    pub async fn get_rates(&self, pairs: &[(String, String)]) -> Vec<FxResult<RateQuote>> {
        stream::iter(pairs)
            .map(|(from, to)| self.get_rate_for_codes(from, to))
            .buffered(self.config.max_concurrency)
            .collect()
            .await
    }

    /// Convert an amount to another currency.
    #[instrument(skip(self), fields(
        from_currency = %request.amount.currency,
        to_currency = %request.target_currency,
        amount = %request.amount.value
    ))]
    pub async fn convert(&self, request: ConversionRequest) -> FxResult<ConversionResult> {
        let quote = self.resolver.resolve(&request.pair()).await?;
        let conversion = ConversionResult::apply(request.amount, quote)?;
        FxMetrics::incr(&self.resolver.raw_metrics().conversions);

        info!(
            output = %conversion.output,
            rate = %conversion.rate.rate,
            source = %conversion.rate.source,
            stale = conversion.stale,
            "Conversion completed"
        );

        Ok(conversion)
    }

    /// Simple conversion returning only the output amount.
    pub async fn convert_simple(&self, amount: &Money, to: &Currency) -> FxResult<Money> {
        let request = ConversionRequest::new(amount.clone(), to.clone());
        Ok(self.convert(request).await?.output)
    }

    /// Convert a batch of unvalidated entries.
    ///
    /// The result has one slot per entry, in entry order; a bad entry fails
    /// only its own slot.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn convert_batch(&self, entries: &[BatchEntry]) -> Vec<FxResult<ConversionResult>> {
        stream::iter(entries)
            .map(|entry| async move {
                let request = entry.to_request()?;
                self.convert(request).await
            })
            .buffered(self.config.max_concurrency)
            .collect()
            .await
    }

    /// Lazy daily series over `[start, end]`; fails if `start > end`.
    pub fn historical_series(
        &self,
        from: &Currency,
        to: &Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FxResult<HistoricalSeries> {
        HistoricalSeries::new(
            Arc::clone(&self.resolver),
            CurrencyPair::new(from.clone(), to.clone()),
            start,
            end,
            self.config.max_concurrency,
        )
    }

    /// Resolve a full daily series.
    pub async fn get_historical_rates(
        &self,
        from: &Currency,
        to: &Currency,
        start: NaiveDate,
        end: NaiveDate,
    ) -> FxResult<HistoricalRates> {
        Ok(self.historical_series(from, to, start, end)?.collect().await)
    }

    /// Currency detection tables.
    pub fn detector(&self) -> &CurrencyDetector {
        &self.detector
    }

    /// Currency for a country code.
    pub fn detect_from_country(&self, code: &str) -> FxResult<Currency> {
        self.detector.from_country_code(code)
    }

    /// Currency for a market ticker symbol.
    pub fn detect_from_market(&self, symbol: &str) -> FxResult<Currency> {
        self.detector.from_market_symbol(symbol)
    }

    /// Currency from an optional country code and ticker symbol; the country
    /// takes precedence.
    pub fn detect(&self, country: Option<&str>, symbol: Option<&str>) -> FxResult<Currency> {
        self.detector.detect(country, symbol)
    }

    /// Drop the cached rate for a pair.
    pub fn invalidate(&self, pair: &CurrencyPair) {
        self.cache.remove(pair);
    }

    /// Drop every cached rate.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Evict rates past the hard expiry.
    pub fn cleanup(&self) {
        self.cache.evict_expired(now());
    }

    /// Get engine statistics.
    pub fn stats(&self) -> FxEngineStats {
        FxEngineStats {
            cache: self.cache.stats(now()),
            resolution: self.resolver.metrics(),
            upstream_fetches: self.resolver.fetches_started(),
            detection: self.detector.stats(),
        }
    }
}

/// Engine statistics.
#[derive(Debug, Clone, Serialize)]
pub struct FxEngineStats {
    pub cache: CacheStats,
    pub resolution: FxMetricsSnapshot,
    pub upstream_fetches: u64,
    pub detection: DetectorStats,
}
