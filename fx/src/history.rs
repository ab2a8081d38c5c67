//! Daily historical rate series.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, BoxStream, StreamExt};
use moneta_common::{days_inclusive, CurrencyPair, RateSource};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{FxError, FxResult};
use crate::resolver::{RateQuote, RateResolver};

/// A lazily-resolved daily series over `[start, end]`.
///
/// Nothing is fetched until the series is streamed or collected. The series
/// can be consumed any number of times; each pass resolves every date
/// independently (already-fetched dates come from the cache).
pub struct HistoricalSeries {
    resolver: Arc<RateResolver>,
    pair: CurrencyPair,
    start: NaiveDate,
    end: NaiveDate,
    concurrency: usize,
}

impl HistoricalSeries {
    pub(crate) fn new(
        resolver: Arc<RateResolver>,
        pair: CurrencyPair,
        start: NaiveDate,
        end: NaiveDate,
        concurrency: usize,
    ) -> FxResult<Self> {
        if start > end {
            return Err(FxError::InvalidDateRange { start, end });
        }
        Ok(Self {
            resolver,
            pair,
            start,
            end,
            concurrency: concurrency.max(1),
        })
    }

    /// The pair this series quotes.
    pub fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    /// Number of dates in the series.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    /// A series always holds at least one date.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Dates covered, ascending.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + Clone {
        days_inclusive(self.start, self.end)
    }

    /// Per-date results in ascending date order.
    ///
    /// Up to `concurrency` dates are resolved at once; output order never
    /// depends on completion order.
    pub fn stream(&self) -> BoxStream<'static, (NaiveDate, FxResult<RateQuote>)> {
        let resolver = Arc::clone(&self.resolver);
        let pair = self.pair.clone();

        stream::iter(self.dates().collect::<Vec<_>>())
            .map(move |date| {
                let resolver = Arc::clone(&resolver);
                let pair = pair.clone();
                async move { (date, resolver.resolve_on(&pair, date).await) }
            })
            .buffered(self.concurrency)
            .boxed()
    }

    /// Resolve every date, keeping successes and reporting omissions.
    pub async fn collect(&self) -> HistoricalRates {
        let mut rates = HistoricalRates {
            pair: self.pair.clone(),
            start: self.start,
            end: self.end,
            points: Vec::with_capacity(self.len()),
            omitted: Vec::new(),
        };

        let mut results = self.stream();
        while let Some((date, result)) = results.next().await {
            match result {
                Ok(quote) => rates.points.push(RatePoint {
                    date,
                    rate: quote.rate.rate,
                    source: quote.rate.source,
                }),
                Err(e) => {
                    warn!(pair = %self.pair, %date, error = %e, "Omitting date from series");
                    rates.omitted.push(OmittedDate {
                        date,
                        code: e.error_code(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            pair = %self.pair,
            points = rates.points.len(),
            omitted = rates.omitted.len(),
            "Historical series resolved"
        );
        rates
    }
}

/// One resolved day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatePoint {
    pub date: NaiveDate,
    pub rate: Decimal,
    pub source: RateSource,
}

/// A day that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OmittedDate {
    pub date: NaiveDate,
    pub code: &'static str,
    pub reason: String,
}

/// Collected series: resolved points plus the dates left out.
#[derive(Debug, Clone, Serialize)]
pub struct HistoricalRates {
    pub pair: CurrencyPair,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub points: Vec<RatePoint>,
    pub omitted: Vec<OmittedDate>,
}

impl HistoricalRates {
    /// True when every date resolved.
    pub fn is_complete(&self) -> bool {
        self.omitted.is_empty()
    }

    /// `(date, rate)` tuples in ascending order.
    pub fn series(&self) -> Vec<(NaiveDate, Decimal)> {
        self.points.iter().map(|p| (p.date, p.rate)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RateCache;
    use crate::config::FxEngineConfig;
    use crate::provider::MockRateProvider;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn setup(days: std::ops::RangeInclusive<u32>) -> (Arc<MockRateProvider>, Arc<RateResolver>) {
        let provider = Arc::new(MockRateProvider::new("test"));
        for day in days {
            provider.set_historical_rate("USD", "EUR", date(day), Decimal::new(900 + day as i64, 3));
        }
        let config = FxEngineConfig::default();
        let resolver = RateResolver::new(provider.clone(), Arc::new(RateCache::new()), &config);
        (provider, Arc::new(resolver))
    }

    fn usd_eur() -> CurrencyPair {
        CurrencyPair::parse("USD", "EUR").unwrap()
    }

    #[test]
    fn test_rejects_inverted_range() {
        let (_, resolver) = setup(1..=1);
        let result = HistoricalSeries::new(resolver, usd_eur(), date(5), date(1), 4);

        assert!(matches!(result, Err(FxError::InvalidDateRange { .. })));
    }

    #[tokio::test]
    async fn test_full_series_in_order() {
        let (provider, resolver) = setup(1..=10);
        provider.set_delay(Duration::from_millis(5));
        let series = HistoricalSeries::new(resolver, usd_eur(), date(1), date(10), 4).unwrap();

        assert_eq!(series.len(), 10);

        let rates = series.collect().await;

        assert!(rates.is_complete());
        assert_eq!(rates.points.len(), 10);
        let dates: Vec<_> = rates.points.iter().map(|p| p.date).collect();
        assert_eq!(dates, series.dates().collect::<Vec<_>>());
        assert_eq!(rates.points[0].rate, dec!(0.901));
        assert_eq!(rates.points[9].rate, dec!(0.910));
    }

    #[tokio::test]
    async fn test_failed_dates_are_omitted_and_reported() {
        let (provider, resolver) = setup(1..=5);
        provider.fail_on(date(3));
        let series = HistoricalSeries::new(resolver, usd_eur(), date(1), date(5), 2).unwrap();

        let rates = series.collect().await;

        assert_eq!(rates.points.len(), 4);
        assert_eq!(rates.omitted.len(), 1);
        assert_eq!(rates.omitted[0].date, date(3));
        assert_eq!(rates.omitted[0].code, "RATE_UNAVAILABLE");
        assert!(rates.series().iter().all(|(d, _)| *d != date(3)));
    }

    #[tokio::test]
    async fn test_series_is_restartable() {
        let (provider, resolver) = setup(1..=3);
        let series = HistoricalSeries::new(resolver, usd_eur(), date(1), date(3), 3).unwrap();

        let first = series.collect().await;
        let calls_after_first = provider.total_calls();
        let second = series.collect().await;

        assert_eq!(first.series(), second.series());
        assert_eq!(provider.total_calls(), calls_after_first);
        assert!(second.points.iter().all(|p| p.source == RateSource::Cache));
    }

    #[tokio::test]
    async fn test_single_day_series() {
        let (_, resolver) = setup(7..=7);
        let series = HistoricalSeries::new(resolver, usd_eur(), date(7), date(7), 1).unwrap();

        let results: Vec<_> = series.stream().collect().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, date(7));
        assert!(results[0].1.is_ok());
    }
}
