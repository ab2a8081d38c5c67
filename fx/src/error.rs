//! FX engine error types.

use chrono::NaiveDate;
use moneta_common::{CommonError, CurrencyPair};
use thiserror::Error;

/// Errors that can occur in the FX engine.
///
/// `Clone` so that a single shared upstream fetch can hand its outcome to
/// every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FxError {
    /// Unrecognized currency code.
    #[error("Invalid currency code: {0}")]
    InvalidCurrencyCode(String),

    /// Every resolution path was exhausted.
    #[error("Rate not available for {0}")]
    RateUnavailable(CurrencyPair),

    /// Historical range with start after end.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Country code absent from the country table.
    #[error("Unknown country: {0}")]
    UnknownCountry(String),

    /// Provider returned an error.
    #[error("Rate provider error: {0}")]
    ProviderError(String),

    /// Upstream fetch did not complete in time.
    #[error("Rate fetch timed out for {0}")]
    Timeout(CurrencyPair),

    /// Provider has no dated quotes.
    #[error("Historical rates not supported by provider {0}")]
    HistoricalUnsupported(String),

    /// Rate deviation between providers exceeds threshold.
    #[error("Rate deviation {deviation_bps} bps exceeds threshold for {pair}")]
    RateDeviation {
        pair: CurrencyPair,
        deviation_bps: u32,
    },

    /// Monetary primitive rejected a value.
    #[error(transparent)]
    Monetary(CommonError),
}

impl FxError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            FxError::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            FxError::RateUnavailable(_) => "RATE_UNAVAILABLE",
            FxError::InvalidDateRange { .. } => "INVALID_DATE_RANGE",
            FxError::UnknownCountry(_) => "UNKNOWN_COUNTRY",
            FxError::ProviderError(_) => "PROVIDER_ERROR",
            FxError::Timeout(_) => "TIMEOUT",
            FxError::HistoricalUnsupported(_) => "HISTORICAL_UNSUPPORTED",
            FxError::RateDeviation { .. } => "RATE_DEVIATION",
            FxError::Monetary(e) => e.error_code(),
        }
    }
}

impl From<CommonError> for FxError {
    fn from(e: CommonError) -> Self {
        match e {
            CommonError::InvalidCurrencyCode(code) => FxError::InvalidCurrencyCode(code),
            other => FxError::Monetary(other),
        }
    }
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
