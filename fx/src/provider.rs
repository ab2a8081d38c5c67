//! Rate provider traits and implementations.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use dashmap::DashMap;
use moneta_common::{CurrencyPair, ExchangeRate, RateSource};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};

/// Trait for upstream exchange-rate sources.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the current rate for a currency pair.
    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<ExchangeRate>;

    /// Get the rate for a currency pair on a past date.
    async fn get_historical_rate(
        &self,
        pair: &CurrencyPair,
        date: NaiveDate,
    ) -> FxResult<ExchangeRate> {
        let _ = (pair, date);
        Err(FxError::HistoricalUnsupported(self.name().to_string()))
    }

    /// Check if this provider quotes the given currency pair.
    fn supports_pair(&self, pair: &CurrencyPair) -> bool;
}

/// Timestamp used for a quote dated `date` (midnight UTC).
pub fn start_of_day(date: NaiveDate) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

/// Aggregates multiple rate providers and returns the median rate.
pub struct AggregatedRateProvider {
    providers: Vec<Arc<dyn RateProvider>>,
    min_providers: usize,
    max_deviation_bps: u32,
}

impl AggregatedRateProvider {
    /// Create a new aggregated provider.
    pub fn new(providers: Vec<Arc<dyn RateProvider>>) -> Self {
        Self {
            providers,
            min_providers: 1,
            max_deviation_bps: 100, // 1% max deviation
        }
    }

    /// Set minimum number of providers required for a valid rate.
    pub fn with_min_providers(mut self, min: usize) -> Self {
        self.min_providers = min;
        self
    }

    /// Set maximum allowed deviation between providers in basis points.
    pub fn with_max_deviation(mut self, bps: u32) -> Self {
        self.max_deviation_bps = bps;
        self
    }

    /// Median of the collected quotes.
    fn calculate_median(&self, rates: &mut [ExchangeRate]) -> ExchangeRate {
        rates.sort_by(|a, b| a.rate.cmp(&b.rate));
        let mid_idx = rates.len() / 2;

        let mut median = rates[mid_idx].clone();
        if rates.len() % 2 == 0 {
            // Average of two middle values
            let (lo, hi) = (rates[mid_idx - 1].rate, rates[mid_idx].rate);
            median.rate = lo + (hi - lo) / Decimal::TWO;
            median.timestamp = rates[mid_idx - 1].timestamp.min(rates[mid_idx].timestamp);
        }
        median.source = RateSource::Api;
        median
    }

    /// Check if quotes deviate too much.
    fn check_deviation(&self, rates: &[ExchangeRate], pair: &CurrencyPair) -> FxResult<()> {
        let (Some(min), Some(max)) = (
            rates.iter().map(|r| r.rate).min(),
            rates.iter().map(|r| r.rate).max(),
        ) else {
            return Ok(());
        };

        let deviation_bps = (max - min)
            .checked_div(min)
            .and_then(|d| d.checked_mul(Decimal::from(10000)))
            .and_then(|d| d.trunc().to_u32())
            .unwrap_or(u32::MAX);

        if deviation_bps > self.max_deviation_bps {
            return Err(FxError::RateDeviation {
                pair: pair.clone(),
                deviation_bps,
            });
        }

        Ok(())
    }

    fn aggregate(
        &self,
        pair: &CurrencyPair,
        mut rates: Vec<ExchangeRate>,
        last_error: Option<FxError>,
    ) -> FxResult<ExchangeRate> {
        if rates.is_empty() || rates.len() < self.min_providers {
            return Err(last_error.unwrap_or_else(|| FxError::RateUnavailable(pair.clone())));
        }

        self.check_deviation(&rates, pair)?;

        Ok(self.calculate_median(&mut rates))
    }
}

#[async_trait]
impl RateProvider for AggregatedRateProvider {
    fn name(&self) -> &str {
        "aggregated"
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<ExchangeRate> {
        let mut rates = Vec::new();
        let mut last_error = None;

        for provider in &self.providers {
            if !provider.supports_pair(pair) {
                continue;
            }

            match provider.get_rate(pair).await {
                Ok(rate) => {
                    debug!(
                        provider = provider.name(),
                        pair = %pair,
                        rate = %rate.rate,
                        "Got rate from provider"
                    );
                    rates.push(rate);
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        pair = %pair,
                        error = %e,
                        "Provider failed to return rate"
                    );
                    last_error = Some(e);
                }
            }
        }

        self.aggregate(pair, rates, last_error)
    }

    async fn get_historical_rate(
        &self,
        pair: &CurrencyPair,
        date: NaiveDate,
    ) -> FxResult<ExchangeRate> {
        let mut rates = Vec::new();
        let mut last_error = None;

        for provider in &self.providers {
            match provider.get_historical_rate(pair, date).await {
                Ok(rate) => rates.push(rate),
                Err(e) => {
                    debug!(provider = provider.name(), pair = %pair, %date, error = %e, "No dated quote");
                    last_error = Some(e);
                }
            }
        }

        self.aggregate(pair, rates, last_error)
    }

    fn supports_pair(&self, pair: &CurrencyPair) -> bool {
        self.providers.iter().any(|p| p.supports_pair(pair))
    }
}

/// One quote in a rate file.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRecord {
    pub from: String,
    pub to: String,
    pub rate: Decimal,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// JSON layout accepted by [`StaticRateProvider::from_json`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateTable {
    #[serde(default)]
    pub spot: Vec<QuoteRecord>,
    #[serde(default)]
    pub historical: Vec<QuoteRecord>,
}

/// In-memory provider quoting exactly the rates it was given.
pub struct StaticRateProvider {
    name: String,
    spot: DashMap<CurrencyPair, Decimal>,
    dated: DashMap<(CurrencyPair, NaiveDate), Decimal>,
}

impl StaticRateProvider {
    /// Create an empty provider.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spot: DashMap::new(),
            dated: DashMap::new(),
        }
    }

    /// Build a provider from a JSON rate table.
    pub fn from_json(name: impl Into<String>, json: &str) -> FxResult<Self> {
        let table: RateTable = serde_json::from_str(json)
            .map_err(|e| FxError::ProviderError(format!("invalid rate table: {}", e)))?;
        Self::from_table(name, table)
    }

    /// Build a provider from parsed quote records.
    pub fn from_table(name: impl Into<String>, table: RateTable) -> FxResult<Self> {
        let provider = Self::new(name);
        for record in table.spot {
            let pair = CurrencyPair::parse(&record.from, &record.to)?;
            provider.set_rate(pair, record.rate)?;
        }
        for record in table.historical {
            let pair = CurrencyPair::parse(&record.from, &record.to)?;
            let date = record.date.ok_or_else(|| {
                FxError::ProviderError(format!("historical quote for {} has no date", pair))
            })?;
            provider.set_historical_rate(pair, date, record.rate)?;
        }
        Ok(provider)
    }

    /// Set the spot rate for a pair.
    pub fn set_rate(&self, pair: CurrencyPair, rate: Decimal) -> FxResult<()> {
        ensure_positive(&pair, rate)?;
        self.spot.insert(pair, rate);
        Ok(())
    }

    /// Set the rate for a pair on a given date.
    pub fn set_historical_rate(&self, pair: CurrencyPair, date: NaiveDate, rate: Decimal) -> FxResult<()> {
        ensure_positive(&pair, rate)?;
        self.dated.insert((pair, date), rate);
        Ok(())
    }
}

fn ensure_positive(pair: &CurrencyPair, rate: Decimal) -> FxResult<()> {
    if rate <= Decimal::ZERO {
        return Err(FxError::ProviderError(format!("non-positive rate {} for {}", rate, pair)));
    }
    Ok(())
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<ExchangeRate> {
        let rate = self
            .spot
            .get(pair)
            .map(|r| *r)
            .ok_or_else(|| FxError::RateUnavailable(pair.clone()))?;
        Ok(ExchangeRate::new(pair.clone(), rate, RateSource::Api)?)
    }

    async fn get_historical_rate(
        &self,
        pair: &CurrencyPair,
        date: NaiveDate,
    ) -> FxResult<ExchangeRate> {
        let rate = self
            .dated
            .get(&(pair.clone(), date))
            .map(|r| *r)
            .ok_or_else(|| FxError::RateUnavailable(pair.clone()))?;
        Ok(ExchangeRate::at(pair.clone(), rate, start_of_day(date), RateSource::Api)?)
    }

    fn supports_pair(&self, pair: &CurrencyPair) -> bool {
        self.spot.contains_key(pair)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRateProvider;

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Mock rate provider for testing: counts calls, can be slowed down or
    /// switched off.
    pub struct MockRateProvider {
        inner: StaticRateProvider,
        calls: DashMap<CurrencyPair, usize>,
        total_calls: AtomicUsize,
        failing: AtomicBool,
        failing_dates: parking_lot::Mutex<HashSet<NaiveDate>>,
        delay: parking_lot::Mutex<Option<Duration>>,
    }

    impl MockRateProvider {
        /// Create a new mock provider.
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                inner: StaticRateProvider::new(name),
                calls: DashMap::new(),
                total_calls: AtomicUsize::new(0),
                failing: AtomicBool::new(false),
                failing_dates: parking_lot::Mutex::new(HashSet::new()),
                delay: parking_lot::Mutex::new(None),
            }
        }

        /// Set a spot rate, e.g. `set_rate("USD", "EUR", dec!(0.92))`.
        pub fn set_rate(&self, from: &str, to: &str, rate: Decimal) {
            let pair = CurrencyPair::parse(from, to).expect("valid test pair");
            self.inner.set_rate(pair, rate).expect("positive test rate");
        }

        /// Set a dated rate.
        pub fn set_historical_rate(&self, from: &str, to: &str, date: NaiveDate, rate: Decimal) {
            let pair = CurrencyPair::parse(from, to).expect("valid test pair");
            self.inner
                .set_historical_rate(pair, date, rate)
                .expect("positive test rate");
        }

        /// Make every call fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Make dated calls for `date` fail.
        pub fn fail_on(&self, date: NaiveDate) {
            self.failing_dates.lock().insert(date);
        }

        /// Delay every call.
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock() = Some(delay);
        }

        /// Calls made for a specific pair.
        pub fn calls_for(&self, from: &str, to: &str) -> usize {
            let pair = CurrencyPair::parse(from, to).expect("valid test pair");
            self.calls.get(&pair).map(|c| *c).unwrap_or(0)
        }

        /// Total calls made.
        pub fn total_calls(&self) -> usize {
            self.total_calls.load(Ordering::SeqCst)
        }

        async fn record(&self, pair: &CurrencyPair) -> FxResult<()> {
            self.total_calls.fetch_add(1, Ordering::SeqCst);
            *self.calls.entry(pair.clone()).or_insert(0) += 1;

            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            if self.failing.load(Ordering::SeqCst) {
                return Err(FxError::ProviderError("mock provider offline".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RateProvider for MockRateProvider {
        fn name(&self) -> &str {
            self.inner.name()
        }

        async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<ExchangeRate> {
            self.record(pair).await?;
            self.inner.get_rate(pair).await
        }

        async fn get_historical_rate(
            &self,
            pair: &CurrencyPair,
            date: NaiveDate,
        ) -> FxResult<ExchangeRate> {
            self.record(pair).await?;
            if self.failing_dates.lock().contains(&date) {
                return Err(FxError::ProviderError(format!("no quote on {}", date)));
            }
            self.inner.get_historical_rate(pair, date).await
        }

        fn supports_pair(&self, pair: &CurrencyPair) -> bool {
            self.inner.supports_pair(pair)
        }
    }
}
