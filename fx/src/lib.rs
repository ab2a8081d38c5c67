//! Moneta FX Engine
//!
//! Exchange-rate resolution and currency conversion.
//!
//! # Features
//!
//! - Spot and historical rates from pluggable providers
//! - Rate caching with staleness tracking
//! - Single-flight upstream fetches per currency pair
//! - Inverse and triangulated fallbacks, then stale rates as a last resort
//! - Currency detection from country codes and ticker symbols
//!
//! # Example
//!
//! ```rust,ignore
//! use moneta_fx::{FxEngine, FxEngineConfig, StaticRateProvider};
//! use moneta_common::{Currency, Money};
//!
//! let engine = FxEngine::new(Arc::new(provider), FxEngineConfig::default());
//!
//! // Get current rate
//! let quote = engine.get_rate(&Currency::usd(), &Currency::eur()).await?;
//!
//! // Convert amount
//! let usd = Money::from_str("1000.00", Currency::usd())?;
//! let eur = engine.convert_simple(&usd, &Currency::eur()).await?;
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod detector;
pub mod engine;
pub mod error;
pub mod history;
pub mod inflight;
pub mod metrics;
pub mod provider;
pub mod resolver;

pub use cache::{CacheStats, RateCache, RateCacheConfig};
pub use config::FxEngineConfig;
pub use conversion::{BatchEntry, BatchOutcome, ConversionRequest, ConversionResult};
pub use detector::{CurrencyDetector, DetectorStats};
pub use engine::{FxEngine, FxEngineStats};
pub use error::{FxError, FxResult};
pub use history::{HistoricalRates, HistoricalSeries, OmittedDate, RatePoint};
pub use metrics::FxMetricsSnapshot;
pub use provider::{AggregatedRateProvider, QuoteRecord, RateProvider, RateTable, StaticRateProvider};
pub use resolver::{RateQuote, RateResolver};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockRateProvider;
