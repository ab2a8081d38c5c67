//! Rate resolution with a graceful-degradation ladder.
//!
//! A request walks an ordered list of [`Step`]s; each either resolves the
//! rate or hands over to the next one. Spot requests end with the stale
//! cache entry before giving up; dated requests have no stale step because
//! a historical quote never ages.
//!
//! Inverted and triangulated rates are cached under their own pair with
//! source [`RateSource::Fallback`]. They feed later derivations, but a
//! request for that pair still tries the direct quote first, and keeps the
//! `Fallback` label whenever the derived entry is what gets served.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use moneta_common::{now, Currency, CurrencyPair, ExchangeRate, RateSource};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::cache::RateCache;
use crate::config::FxEngineConfig;
use crate::error::{FxError, FxResult};
use crate::inflight::InFlight;
use crate::metrics::{FxMetrics, FxMetricsSnapshot};
use crate::provider::{start_of_day, RateProvider};

/// A resolved rate plus whether it is past the staleness threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateQuote {
    pub rate: ExchangeRate,
    pub stale: bool,
}

impl RateQuote {
    fn fresh(rate: ExchangeRate) -> Self {
        Self { rate, stale: false }
    }

    /// Warning for callers to surface next to the result.
    pub fn warning(&self) -> Option<String> {
        self.stale.then(|| {
            format!(
                "Rate for {} is {} minutes old; upstream sources are unavailable",
                self.rate.pair,
                self.rate.age(now()).num_minutes()
            )
        })
    }
}

/// One rung of the resolution ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Same currency on both sides: rate 1.
    Identity,
    /// Fresh cached quote.
    Cached,
    /// Direct upstream quote.
    Direct,
    /// Inverted quote for the reverse pair.
    Inverse,
    /// Cross rate through the base currency.
    Triangulate,
    /// Cached quote past the staleness threshold.
    Stale,
}

/// Ladder for current rates.
pub const SPOT_LADDER: &[Step] = &[
    Step::Identity,
    Step::Cached,
    Step::Direct,
    Step::Inverse,
    Step::Triangulate,
    Step::Stale,
];

/// Ladder for rates on a past date.
pub const DATED_LADDER: &[Step] = &[
    Step::Identity,
    Step::Cached,
    Step::Direct,
    Step::Inverse,
    Step::Triangulate,
];

enum Outcome {
    Resolved(RateQuote),
    Continue(Option<FxError>),
}

/// Resolves rates from cache or upstream, coalescing concurrent fetches.
pub struct RateResolver {
    provider: Arc<dyn RateProvider>,
    cache: Arc<RateCache>,
    spot_fetches: Arc<InFlight<CurrencyPair>>,
    dated_fetches: Arc<InFlight<(CurrencyPair, NaiveDate)>>,
    base_currency: Currency,
    fetch_timeout: Duration,
    metrics: FxMetrics,
}

impl RateResolver {
    /// Create a resolver over `provider`, writing through to `cache`.
    pub fn new(
        provider: Arc<dyn RateProvider>,
        cache: Arc<RateCache>,
        config: &FxEngineConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            spot_fetches: Arc::new(InFlight::new()),
            dated_fetches: Arc::new(InFlight::new()),
            base_currency: config.base_currency.clone(),
            fetch_timeout: config.fetch_timeout,
            metrics: FxMetrics::new(),
        }
    }

    /// Resolve the current rate for a pair.
    #[instrument(skip(self), fields(pair = %pair))]
    pub async fn resolve(&self, pair: &CurrencyPair) -> FxResult<RateQuote> {
        self.run_ladder(pair, None, SPOT_LADDER).await
    }

    /// Resolve the rate for a pair on `date`.
    #[instrument(skip(self), fields(pair = %pair))]
    pub async fn resolve_on(&self, pair: &CurrencyPair, date: NaiveDate) -> FxResult<RateQuote> {
        self.run_ladder(pair, Some(date), DATED_LADDER).await
    }

    /// The underlying cache.
    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    /// Resolution counters.
    pub fn metrics(&self) -> FxMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn raw_metrics(&self) -> &FxMetrics {
        &self.metrics
    }

    /// Upstream fetches started (spot and dated).
    pub fn fetches_started(&self) -> u64 {
        self.spot_fetches.started() + self.dated_fetches.started()
    }

    async fn run_ladder(
        &self,
        pair: &CurrencyPair,
        date: Option<NaiveDate>,
        ladder: &[Step],
    ) -> FxResult<RateQuote> {
        let mut last_error = None;

        for step in ladder {
            match self.attempt(*step, pair, date).await {
                Outcome::Resolved(quote) => {
                    self.record(*step);
                    debug!(step = ?step, rate = %quote.rate.rate, source = %quote.rate.source, "Rate resolved");
                    return Ok(quote);
                }
                Outcome::Continue(Some(e)) => {
                    debug!(step = ?step, error = %e, "Resolution step failed");
                    last_error = Some(e);
                }
                Outcome::Continue(None) => {}
            }
        }

        FxMetrics::incr(&self.metrics.unavailable);
        warn!(
            pair = %pair,
            date = ?date,
            last_error = ?last_error.as_ref().map(ToString::to_string),
            "No rate available on any path"
        );
        Err(FxError::RateUnavailable(pair.clone()))
    }

    async fn attempt(&self, step: Step, pair: &CurrencyPair, date: Option<NaiveDate>) -> Outcome {
        match step {
            Step::Identity => {
                if !pair.is_identity() {
                    return Outcome::Continue(None);
                }
                let mut rate = ExchangeRate::identity(pair.base.clone());
                if let Some(date) = date {
                    rate.timestamp = start_of_day(date);
                }
                Outcome::Resolved(RateQuote::fresh(rate))
            }
            Step::Cached => match self.cached(pair, date).filter(is_quoted) {
                Some(rate) => Outcome::Resolved(RateQuote::fresh(rate.with_source(RateSource::Cache))),
                None => Outcome::Continue(None),
            },
            Step::Direct => match self.fetch(pair, date).await {
                Ok(rate) => Outcome::Resolved(RateQuote::fresh(rate)),
                Err(e) => Outcome::Continue(Some(e)),
            },
            Step::Inverse => match self.inverse(pair, date).await {
                Ok(rate) => Outcome::Resolved(RateQuote::fresh(rate)),
                Err(e) => Outcome::Continue(Some(e)),
            },
            Step::Triangulate => match self.triangulate(pair, date).await {
                Ok(Some(rate)) => Outcome::Resolved(RateQuote::fresh(rate)),
                Ok(None) => Outcome::Continue(None),
                Err(e) => Outcome::Continue(Some(e)),
            },
            Step::Stale => match self.cache.get(pair) {
                Some(rate) => {
                    warn!(
                        pair = %pair,
                        age_secs = rate.age(now()).num_seconds(),
                        "Serving stale rate"
                    );
                    Outcome::Resolved(RateQuote {
                        rate: served_from_cache(rate),
                        stale: true,
                    })
                }
                None => Outcome::Continue(None),
            },
        }
    }

    fn record(&self, step: Step) {
        let counter = match step {
            Step::Identity => return,
            Step::Cached => &self.metrics.cache_hits,
            Step::Direct => &self.metrics.direct_quotes,
            Step::Inverse => &self.metrics.inverse_quotes,
            Step::Triangulate => &self.metrics.triangulated_quotes,
            Step::Stale => &self.metrics.stale_served,
        };
        FxMetrics::incr(counter);
    }

    fn cached(&self, pair: &CurrencyPair, date: Option<NaiveDate>) -> Option<ExchangeRate> {
        match date {
            None => self.cache.get_fresh(pair, now()),
            Some(date) => self.cache.get_dated(pair, date),
        }
    }

    fn store(&self, date: Option<NaiveDate>, rate: ExchangeRate) {
        match date {
            None => self.cache.put(rate),
            Some(date) => self.cache.put_dated(date, rate),
        }
    }

    async fn fetch(&self, pair: &CurrencyPair, date: Option<NaiveDate>) -> FxResult<ExchangeRate> {
        match date {
            None => self.fetch_spot(pair).await,
            Some(date) => self.fetch_dated(pair, date).await,
        }
    }

    async fn fetch_spot(&self, pair: &CurrencyPair) -> FxResult<ExchangeRate> {
        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let timeout = self.fetch_timeout;
        let key = pair.clone();

        self.spot_fetches
            .run(
                pair.clone(),
                || {
                    self.cache
                        .get_fresh(pair, now())
                        .filter(is_quoted)
                        .map(|r| r.with_source(RateSource::Cache))
                },
                move || async move {
                    let rate = upstream(timeout, &key, provider.get_rate(&key)).await?;
                    cache.put(rate.clone());
                    Ok(rate)
                },
            )
            .await
    }

    async fn fetch_dated(&self, pair: &CurrencyPair, date: NaiveDate) -> FxResult<ExchangeRate> {
        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let timeout = self.fetch_timeout;
        let key = pair.clone();

        self.dated_fetches
            .run(
                (pair.clone(), date),
                || self.cache.get_dated(pair, date).filter(is_quoted),
                move || async move {
                    let rate =
                        upstream(timeout, &key, provider.get_historical_rate(&key, date)).await?;
                    cache.put_dated(date, rate.clone());
                    Ok(rate)
                },
            )
            .await
    }

    /// Derive the rate from a quote for the reverse pair.
    async fn inverse(&self, pair: &CurrencyPair, date: Option<NaiveDate>) -> FxResult<ExchangeRate> {
        let reverse = pair.inverse();
        let quote = match self.cached(&reverse, date) {
            Some(rate) => rate,
            None => self.fetch(&reverse, date).await?,
        };

        let derived = quote.inverse();
        self.store(date, derived.clone());
        Ok(derived)
    }

    /// One leg of a triangulation: direct if possible, else inverted.
    async fn leg(&self, pair: &CurrencyPair, date: Option<NaiveDate>) -> FxResult<ExchangeRate> {
        if let Some(rate) = self.cached(pair, date) {
            return Ok(rate);
        }
        match self.fetch(pair, date).await {
            Ok(rate) => Ok(rate),
            Err(direct_error) => self.inverse(pair, date).await.map_err(|_| direct_error),
        }
    }

    async fn triangulate(
        &self,
        pair: &CurrencyPair,
        date: Option<NaiveDate>,
    ) -> FxResult<Option<ExchangeRate>> {
        let base = &self.base_currency;
        if pair.base == *base || pair.quote == *base {
            return Ok(None);
        }

        let first = self
            .leg(&CurrencyPair::new(pair.base.clone(), base.clone()), date)
            .await?;
        let second = self
            .leg(&CurrencyPair::new(base.clone(), pair.quote.clone()), date)
            .await?;

        let cross = first.cross(&second)?;
        debug!(pair = %pair, via = %base, rate = %cross.rate, "Triangulated rate");
        self.store(date, cross.clone());
        Ok(Some(cross))
    }
}

/// True for a rate an upstream source quoted, false for one derived here.
fn is_quoted(rate: &ExchangeRate) -> bool {
    rate.source != RateSource::Fallback
}

/// Relabel a cache entry for serving; derived entries stay `Fallback`.
fn served_from_cache(rate: ExchangeRate) -> ExchangeRate {
    if is_quoted(&rate) {
        rate.with_source(RateSource::Cache)
    } else {
        rate
    }
}

/// Await an upstream call under `timeout` and check it quoted the right pair.
async fn upstream<F>(timeout: Duration, pair: &CurrencyPair, call: F) -> FxResult<ExchangeRate>
where
    F: Future<Output = FxResult<ExchangeRate>>,
{
    let rate = tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| FxError::Timeout(pair.clone()))??;

    if rate.pair != *pair {
        return Err(FxError::ProviderError(format!(
            "asked for {}, provider quoted {}",
            pair, rate.pair
        )));
    }

    Ok(rate.with_source(RateSource::Api))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockRateProvider;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    fn pair(from: &str, to: &str) -> CurrencyPair {
        CurrencyPair::parse(from, to).unwrap()
    }

    fn setup() -> (Arc<MockRateProvider>, RateResolver) {
        setup_with(FxEngineConfig::default())
    }

    fn setup_with(config: FxEngineConfig) -> (Arc<MockRateProvider>, RateResolver) {
        let provider = Arc::new(MockRateProvider::new("test"));
        provider.set_rate("USD", "EUR", dec!(0.92));
        provider.set_rate("GBP", "USD", dec!(1.25));
        let cache = Arc::new(RateCache::with_config(config.cache.clone()));
        let resolver = RateResolver::new(provider.clone(), cache, &config);
        (provider, resolver)
    }

    fn stale_rate(from: &str, to: &str, rate: rust_decimal::Decimal) -> ExchangeRate {
        ExchangeRate::at(pair(from, to), rate, now() - ChronoDuration::hours(3), RateSource::Api)
            .unwrap()
    }

    #[tokio::test]
    async fn test_identity_skips_cache_and_provider() {
        let (provider, resolver) = setup();

        let quote = resolver.resolve(&pair("EUR", "EUR")).await.unwrap();

        assert_eq!(quote.rate.rate, dec!(1));
        assert_eq!(quote.rate.source, RateSource::Identity);
        assert!(!quote.stale);
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_direct_fetch_writes_through() {
        let (provider, resolver) = setup();

        let first = resolver.resolve(&pair("USD", "EUR")).await.unwrap();
        assert_eq!(first.rate.rate, dec!(0.92));
        assert_eq!(first.rate.source, RateSource::Api);

        let second = resolver.resolve(&pair("USD", "EUR")).await.unwrap();
        assert_eq!(second.rate.source, RateSource::Cache);
        assert_eq!(provider.calls_for("USD", "EUR"), 1);

        let metrics = resolver.metrics();
        assert_eq!(metrics.direct_quotes, 1);
        assert_eq!(metrics.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_inverse_fallback() {
        let (_, resolver) = setup();

        let quote = resolver.resolve(&pair("USD", "GBP")).await.unwrap();

        assert_eq!(quote.rate.rate, dec!(0.8));
        assert_eq!(quote.rate.source, RateSource::Fallback);
        assert_eq!(resolver.metrics().inverse_quotes, 1);
    }

    #[tokio::test]
    async fn test_triangulation_through_base() {
        let (_, resolver) = setup();

        // GBP/USD 1.25 x USD/EUR 0.92
        let quote = resolver.resolve(&pair("GBP", "EUR")).await.unwrap();

        assert_eq!(quote.rate.rate, dec!(1.15));
        assert_eq!(quote.rate.source, RateSource::Fallback);
        assert!(!quote.stale);
        assert_eq!(resolver.metrics().triangulated_quotes, 1);

        // EUR/GBP is derived from the cached GBP/EUR cross rate.
        let reverse = resolver.resolve(&pair("EUR", "GBP")).await.unwrap();
        assert_eq!(reverse.rate.source, RateSource::Fallback);
        assert!((reverse.rate.rate * dec!(1.15) - dec!(1)).abs() < dec!(0.0000001));
    }

    #[tokio::test]
    async fn test_derived_rate_keeps_fallback_and_retries_direct() {
        let (provider, resolver) = setup();

        let first = resolver.resolve(&pair("USD", "GBP")).await.unwrap();
        assert_eq!(first.rate.rate, dec!(0.8));
        assert_eq!(first.rate.source, RateSource::Fallback);

        // The derived entry is not served as a plain cache hit.
        let second = resolver.resolve(&pair("USD", "GBP")).await.unwrap();
        assert_eq!(second.rate.rate, dec!(0.8));
        assert_eq!(second.rate.source, RateSource::Fallback);
        assert_eq!(provider.calls_for("USD", "GBP"), 2);
        assert_eq!(provider.calls_for("GBP", "USD"), 1);
        assert_eq!(resolver.metrics().cache_hits, 0);

        // Once a direct quote exists it replaces the derived one.
        provider.set_rate("USD", "GBP", dec!(0.81));
        let third = resolver.resolve(&pair("USD", "GBP")).await.unwrap();
        assert_eq!(third.rate.rate, dec!(0.81));
        assert_eq!(third.rate.source, RateSource::Api);

        let fourth = resolver.resolve(&pair("USD", "GBP")).await.unwrap();
        assert_eq!(fourth.rate.source, RateSource::Cache);
        assert_eq!(provider.calls_for("USD", "GBP"), 3);
    }

    #[tokio::test]
    async fn test_stale_derived_rate_stays_fallback() {
        let (provider, resolver) = setup();
        resolver
            .cache()
            .put(stale_rate("EUR", "GBP", dec!(0.87)).with_source(RateSource::Fallback));
        provider.set_failing(true);

        let quote = resolver.resolve(&pair("EUR", "GBP")).await.unwrap();

        assert!(quote.stale);
        assert_eq!(quote.rate.rate, dec!(0.87));
        assert_eq!(quote.rate.source, RateSource::Fallback);
    }

    #[tokio::test]
    async fn test_stale_served_when_upstream_down() {
        let (provider, resolver) = setup();
        resolver.cache().put(stale_rate("USD", "EUR", dec!(0.90)));
        provider.set_failing(true);

        let quote = resolver.resolve(&pair("USD", "EUR")).await.unwrap();

        assert!(quote.stale);
        assert_eq!(quote.rate.rate, dec!(0.90));
        assert_eq!(quote.rate.source, RateSource::Cache);
        assert!(quote.warning().is_some());

        // The failed fetch left the stale entry in place.
        assert!(resolver.cache().get(&pair("USD", "EUR")).is_some());
    }

    #[tokio::test]
    async fn test_stale_entry_refreshed_when_upstream_up() {
        let (provider, resolver) = setup();
        resolver.cache().put(stale_rate("USD", "EUR", dec!(0.90)));

        let quote = resolver.resolve(&pair("USD", "EUR")).await.unwrap();

        assert!(!quote.stale);
        assert_eq!(quote.rate.rate, dec!(0.92));
        assert_eq!(provider.calls_for("USD", "EUR"), 1);
        assert_eq!(resolver.cache().get(&pair("USD", "EUR")).unwrap().rate, dec!(0.92));
    }

    #[tokio::test]
    async fn test_unavailable_when_every_path_fails() {
        let (provider, resolver) = setup();
        provider.set_failing(true);

        let result = resolver.resolve(&pair("USD", "JPY")).await;

        assert_eq!(result, Err(FxError::RateUnavailable(pair("USD", "JPY"))));
        assert_eq!(resolver.metrics().unavailable, 1);
    }

    #[tokio::test]
    async fn test_timeout_engages_fallback() {
        let config = FxEngineConfig {
            fetch_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let (provider, resolver) = setup_with(config);
        provider.set_delay(Duration::from_millis(500));
        resolver.cache().put(stale_rate("USD", "EUR", dec!(0.90)));

        let quote = resolver.resolve(&pair("USD", "EUR")).await.unwrap();

        assert!(quote.stale);
        assert_eq!(quote.rate.rate, dec!(0.90));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let (provider, resolver) = setup();
        provider.set_delay(Duration::from_millis(50));
        let resolver = Arc::new(resolver);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.resolve(&pair("USD", "EUR")).await })
            })
            .collect();

        for handle in handles {
            let quote = handle.await.unwrap().unwrap();
            assert_eq!(quote.rate.rate, dec!(0.92));
        }

        assert_eq!(provider.calls_for("USD", "EUR"), 1);
        assert_eq!(resolver.fetches_started(), 1);
    }

    #[tokio::test]
    async fn test_dated_resolution() {
        let (provider, resolver) = setup();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        provider.set_historical_rate("USD", "EUR", date, dec!(0.91));

        let quote = resolver.resolve_on(&pair("USD", "EUR"), date).await.unwrap();
        assert_eq!(quote.rate.rate, dec!(0.91));
        assert_eq!(quote.rate.timestamp, start_of_day(date));

        let inverse = resolver.resolve_on(&pair("EUR", "USD"), date).await.unwrap();
        assert_eq!(inverse.rate.source, RateSource::Fallback);

        let cached = resolver.resolve_on(&pair("USD", "EUR"), date).await.unwrap();
        assert_eq!(cached.rate.source, RateSource::Cache);
        assert_eq!(provider.calls_for("USD", "EUR"), 1);
    }

    #[tokio::test]
    async fn test_dated_resolution_never_serves_spot_stale() {
        let (provider, resolver) = setup();
        resolver.cache().put(stale_rate("USD", "EUR", dec!(0.90)));
        provider.set_failing(true);
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let result = resolver.resolve_on(&pair("USD", "EUR"), date).await;

        assert!(matches!(result, Err(FxError::RateUnavailable(_))));
    }
}
