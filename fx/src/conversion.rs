//! Currency conversion types and operations.

use moneta_common::{round_half_even, Currency, CurrencyPair, ExchangeRate, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FxError, FxResult};
use crate::resolver::RateQuote;

/// Represents a completed currency conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    /// Input amount.
    pub input: Money,
    /// Output amount, rounded to the target currency's minor units.
    pub output: Money,
    /// Rate used for conversion.
    pub rate: ExchangeRate,
    /// Whether the rate was past the staleness threshold.
    pub stale: bool,
}

impl ConversionResult {
    /// Apply a resolved quote to `input`.
    ///
    /// Same-currency conversions return the input untouched; everything else
    /// is rounded half-to-even to the target's decimal places.
    pub fn apply(input: Money, quote: RateQuote) -> FxResult<Self> {
        if input.currency != quote.rate.pair.base {
            return Err(FxError::Monetary(moneta_common::CommonError::CurrencyMismatch {
                expected: quote.rate.pair.base.clone(),
                actual: input.currency.clone(),
            }));
        }

        let target = quote.rate.pair.quote.clone();
        let output = if quote.rate.pair.is_identity() {
            input.clone()
        } else {
            let raw = input.checked_mul(quote.rate.rate)?;
            Money::new(round_half_even(raw.value, target.decimal_places()), target)
        };

        Ok(Self {
            input,
            output,
            rate: quote.rate,
            stale: quote.stale,
        })
    }

    /// Get the currency pair.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.input.currency.clone(), self.output.currency.clone())
    }

    /// Staleness warning, if any.
    pub fn warning(&self) -> Option<String> {
        RateQuote {
            rate: self.rate.clone(),
            stale: self.stale,
        }
        .warning()
    }
}

/// Request to perform a conversion.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Amount to convert.
    pub amount: Money,
    /// Target currency.
    pub target_currency: Currency,
}

impl ConversionRequest {
    /// Create a new conversion request.
    pub fn new(amount: Money, target_currency: Currency) -> Self {
        Self {
            amount,
            target_currency,
        }
    }

    /// Currency pair this request needs a rate for.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.amount.currency.clone(), self.target_currency.clone())
    }
}

/// Unvalidated batch entry as received from a caller.
///
/// Codes are parsed per entry so one bad code only fails its own slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
}

impl BatchEntry {
    /// Create a batch entry.
    pub fn new(amount: Decimal, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            amount,
            from: from.into(),
            to: to.into(),
        }
    }

    /// Validate the codes into a request.
    pub fn to_request(&self) -> FxResult<ConversionRequest> {
        let from = Currency::parse(&self.from)?;
        let to = Currency::parse(&self.to)?;
        Ok(ConversionRequest::new(Money::new(self.amount, from), to))
    }
}

/// Outcome of one batch slot, shaped for serialization.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    Ok {
        #[serde(flatten)]
        result: ConversionResult,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

impl From<FxResult<ConversionResult>> for BatchOutcome {
    fn from(result: FxResult<ConversionResult>) -> Self {
        match result {
            Ok(result) => BatchOutcome::Ok { result },
            Err(e) => BatchOutcome::Error {
                code: e.error_code(),
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneta_common::RateSource;
    use rust_decimal_macros::dec;

    fn quote(from: &str, to: &str, rate: Decimal) -> RateQuote {
        RateQuote {
            rate: ExchangeRate::new(CurrencyPair::parse(from, to).unwrap(), rate, RateSource::Api)
                .unwrap(),
            stale: false,
        }
    }

    #[test]
    fn test_apply_rounds_half_even() {
        let input = Money::new(dec!(10.25), Currency::usd());
        // 10.25 * 0.5 = 5.125 -> 5.12
        let result = ConversionResult::apply(input, quote("USD", "EUR", dec!(0.5))).unwrap();
        assert_eq!(result.output.value, dec!(5.12));

        let input = Money::new(dec!(10.35), Currency::usd());
        // 10.35 * 0.5 = 5.175 -> 5.18
        let result = ConversionResult::apply(input, quote("USD", "EUR", dec!(0.5))).unwrap();
        assert_eq!(result.output.value, dec!(5.18));
    }

    #[test]
    fn test_apply_uses_target_decimal_places() {
        let input = Money::new(dec!(10.00), Currency::usd());
        let result = ConversionResult::apply(input, quote("USD", "JPY", dec!(151.37))).unwrap();

        assert_eq!(result.output.value, dec!(1514));
        assert_eq!(result.output.currency, Currency::jpy());
    }

    #[test]
    fn test_identity_is_exact() {
        let input = Money::new(dec!(1.23456), Currency::eur());
        let identity = RateQuote {
            rate: ExchangeRate::identity(Currency::eur()),
            stale: false,
        };

        let result = ConversionResult::apply(input.clone(), identity).unwrap();
        assert_eq!(result.output, input);
    }

    #[test]
    fn test_apply_rejects_wrong_base() {
        let input = Money::new(dec!(1), Currency::gbp());
        assert!(ConversionResult::apply(input, quote("USD", "EUR", dec!(0.9))).is_err());
    }

    #[test]
    fn test_apply_rounds_fresh_quote() {
        let input = Money::new(dec!(1000), Currency::usd());
        let result = ConversionResult::apply(input, quote("USD", "EUR", dec!(0.92))).unwrap();

        assert_eq!(result.output, Money::new(dec!(920.00), Currency::eur()));
        assert!(result.warning().is_none());
    }

    #[test]
    fn test_apply_overflow_is_an_error() {
        let input = Money::new(Decimal::MAX, Currency::usd());
        let result = ConversionResult::apply(input, quote("USD", "JPY", dec!(151.37)));

        assert!(matches!(
            result,
            Err(FxError::Monetary(moneta_common::CommonError::Overflow(_)))
        ));
    }

    #[test]
    fn test_batch_entry_validation() {
        assert!(BatchEntry::new(dec!(1), "usd", "eur").to_request().is_ok());
        assert!(matches!(
            BatchEntry::new(dec!(1), "USD", "QQQ").to_request(),
            Err(FxError::InvalidCurrencyCode(_))
        ));
    }

    #[test]
    fn test_batch_outcome_serialization() {
        let err: BatchOutcome = Err(FxError::InvalidCurrencyCode("QQQ".into())).into();
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "INVALID_CURRENCY_CODE");
    }
}
