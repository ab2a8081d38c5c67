//! Monetary types for the Moneta engine.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use crate::currencies::{self, CurrencyInfo};
use crate::error::{CommonError, Result};
use crate::time::{now, Timestamp};

/// A monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value (high precision decimal).
    pub value: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Create an amount that must not be negative (balances, principal).
    pub fn non_negative(value: Decimal, currency: Currency) -> Result<Self> {
        if value < Decimal::ZERO {
            return Err(CommonError::NegativeAmount(format!("{} {}", value, currency)));
        }
        Ok(Self { value, currency })
    }

    /// Create from a string value.
    pub fn from_str(value: &str, currency: Currency) -> std::result::Result<Self, rust_decimal::Error> {
        Ok(Self {
            value: value.parse()?,
            currency,
        })
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            value: Decimal::ZERO,
            currency,
        }
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Check if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.value < Decimal::ZERO
    }

    /// Round to the currency's minor units, half to even.
    pub fn round(&self) -> Self {
        Self {
            value: round_half_even(self.value, self.currency.decimal_places()),
            currency: self.currency.clone(),
        }
    }

    /// Smaller of two amounts in the same currency.
    pub fn min(self, other: Money) -> Result<Money> {
        self.ensure_same_currency(&other)?;
        Ok(if other.value < self.value { other } else { self })
    }

    /// Sum of two amounts in the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        let value = self
            .value
            .checked_add(other.value)
            .ok_or_else(|| CommonError::Overflow(format!("{} + {}", self, other)))?;
        Ok(Money::new(value, self.currency.clone()))
    }

    /// Difference of two amounts in the same currency.
    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.ensure_same_currency(other)?;
        let value = self
            .value
            .checked_sub(other.value)
            .ok_or_else(|| CommonError::Overflow(format!("{} - {}", self, other)))?;
        Ok(Money::new(value, self.currency.clone()))
    }

    /// Scale by `factor`, keeping the currency. Not rounded.
    pub fn checked_mul(&self, factor: Decimal) -> Result<Money> {
        let value = self
            .value
            .checked_mul(factor)
            .ok_or_else(|| CommonError::Overflow(format!("{} * {}", self, factor)))?;
        Ok(Money::new(value, self.currency.clone()))
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(CommonError::CurrencyMismatch {
                expected: self.currency.clone(),
                actual: other.currency.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

impl Add for Money {
    type Output = Result<Money>;

    fn add(self, other: Money) -> Self::Output {
        self.checked_add(&other)
    }
}

impl Sub for Money {
    type Output = Result<Money>;

    fn sub(self, other: Money) -> Self::Output {
        self.checked_sub(&other)
    }
}

/// Round `value` to `places` decimals using banker's rounding.
pub fn round_half_even(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// ISO 4217 currency code, validated against the static currency table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse and validate a currency code (case-insensitive).
    pub fn parse(code: &str) -> Result<Self> {
        let upper = code.trim().to_ascii_uppercase();
        if upper.len() != 3 || !upper.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CommonError::InvalidCurrencyCode(code.to_string()));
        }
        match currencies::lookup(&upper) {
            Some(info) => Ok(Self(info.code.to_string())),
            None => Err(CommonError::InvalidCurrencyCode(code.to_string())),
        }
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Reference data for this currency.
    pub fn info(&self) -> &'static CurrencyInfo {
        // Constructed only through `parse`, so the lookup always succeeds.
        currencies::lookup(&self.0).unwrap_or(&currencies::CURRENCIES[0])
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        self.info().decimal_places
    }

    /// Display symbol, e.g. `£`.
    pub fn symbol(&self) -> &'static str {
        self.info().symbol
    }

    // Common currencies

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn gbp() -> Self {
        Self("GBP".to_string())
    }

    pub fn jpy() -> Self {
        Self("JPY".to_string())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Currency {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = CommonError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.0
    }
}

/// A currency pair for FX operations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency (being converted from).
    pub base: Currency,
    /// Quote currency (being converted to).
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Parse both legs from codes.
    pub fn parse(base: &str, quote: &str) -> Result<Self> {
        Ok(Self::new(Currency::parse(base)?, Currency::parse(quote)?))
    }

    /// Get the inverse pair.
    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    /// True when both legs are the same currency.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Where an exchange rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    /// Fetched directly from an upstream provider.
    Api,
    /// Served from the rate cache.
    Cache,
    /// Derived by inversion or triangulation.
    Fallback,
    /// Same-currency pair, rate 1.
    Identity,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateSource::Api => "api",
            RateSource::Cache => "cache",
            RateSource::Fallback => "fallback",
            RateSource::Identity => "identity",
        };
        f.write_str(s)
    }
}

/// Exchange rate between two currencies: one unit of `pair.base` buys
/// `rate` units of `pair.quote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// The currency pair.
    pub pair: CurrencyPair,
    /// Positive conversion factor.
    pub rate: Decimal,
    /// When this rate was quoted.
    pub timestamp: Timestamp,
    /// Rate origin.
    pub source: RateSource,
}

impl ExchangeRate {
    /// Create a rate quoted now.
    pub fn new(pair: CurrencyPair, rate: Decimal, source: RateSource) -> Result<Self> {
        Self::at(pair, rate, now(), source)
    }

    /// Create a rate quoted at a specific instant.
    pub fn at(
        pair: CurrencyPair,
        rate: Decimal,
        timestamp: Timestamp,
        source: RateSource,
    ) -> Result<Self> {
        if rate <= Decimal::ZERO {
            return Err(CommonError::NonPositiveRate(format!("{} for {}", rate, pair)));
        }
        Ok(Self {
            pair,
            rate,
            timestamp,
            source,
        })
    }

    /// The synthetic 1.0 rate for a currency to itself.
    pub fn identity(currency: Currency) -> Self {
        Self {
            pair: CurrencyPair::new(currency.clone(), currency),
            rate: Decimal::ONE,
            timestamp: now(),
            source: RateSource::Identity,
        }
    }

    /// Derive the inverse quote.
    pub fn inverse(&self) -> Self {
        Self {
            pair: self.pair.inverse(),
            rate: Decimal::ONE / self.rate,
            timestamp: self.timestamp,
            source: RateSource::Fallback,
        }
    }

    /// Compose `self` (A/B) with `other` (B/C) into A/C.
    ///
    /// The cross rate carries the older of the two timestamps.
    pub fn cross(&self, other: &ExchangeRate) -> Result<Self> {
        if self.pair.quote != other.pair.base {
            return Err(CommonError::CurrencyMismatch {
                expected: self.pair.quote.clone(),
                actual: other.pair.base.clone(),
            });
        }
        let rate = self.rate.checked_mul(other.rate).ok_or_else(|| {
            CommonError::Overflow(format!("{} x {}", self.pair, other.pair))
        })?;
        Ok(Self {
            pair: CurrencyPair::new(self.pair.base.clone(), other.pair.quote.clone()),
            rate,
            timestamp: self.timestamp.min(other.timestamp),
            source: RateSource::Fallback,
        })
    }

    /// Same rate, relabelled with a different source.
    pub fn with_source(mut self, source: RateSource) -> Self {
        self.source = source;
        self
    }

    /// Age of the quote at `at`.
    pub fn age(&self, at: Timestamp) -> chrono::Duration {
        at.signed_duration_since(self.timestamp)
    }
}
