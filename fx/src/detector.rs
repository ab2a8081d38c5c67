//! Currency detection from country codes and market ticker suffixes.

use std::sync::atomic::{AtomicU64, Ordering};

use moneta_common::Currency;
use serde::Serialize;
use tracing::debug;

use crate::error::{FxError, FxResult};

/// ISO 3166-1 alpha-2 country code to currency.
static COUNTRY_CURRENCIES: &[(&str, &str)] = &[
    ("US", "USD"), ("PR", "USD"), ("EC", "USD"), ("SV", "USD"),
    ("GB", "GBP"), ("IM", "GBP"), ("JE", "GBP"), ("GG", "GBP"),
    ("DE", "EUR"), ("FR", "EUR"), ("IT", "EUR"), ("ES", "EUR"),
    ("NL", "EUR"), ("BE", "EUR"), ("AT", "EUR"), ("PT", "EUR"),
    ("IE", "EUR"), ("FI", "EUR"), ("GR", "EUR"), ("LU", "EUR"),
    ("SK", "EUR"), ("SI", "EUR"), ("EE", "EUR"), ("LV", "EUR"),
    ("LT", "EUR"), ("MT", "EUR"), ("CY", "EUR"), ("HR", "EUR"),
    ("JP", "JPY"), ("CH", "CHF"), ("LI", "CHF"), ("CA", "CAD"),
    ("AU", "AUD"), ("NZ", "NZD"), ("CN", "CNY"), ("HK", "HKD"),
    ("SG", "SGD"), ("IN", "INR"), ("KR", "KRW"), ("SE", "SEK"),
    ("NO", "NOK"), ("DK", "DKK"), ("PL", "PLN"), ("CZ", "CZK"),
    ("HU", "HUF"), ("BR", "BRL"), ("MX", "MXN"), ("ZA", "ZAR"),
    ("TR", "TRY"), ("RU", "RUB"), ("IL", "ILS"), ("AE", "AED"),
    ("SA", "SAR"), ("TH", "THB"), ("ID", "IDR"), ("MY", "MYR"),
    ("PH", "PHP"), ("TW", "TWD"), ("VN", "VND"), ("CL", "CLP"),
    ("IS", "ISK"), ("BH", "BHD"), ("KW", "KWD"), ("OM", "OMR"),
    ("JO", "JOD"),
];

/// Exchange ticker suffix (the part after the last `.`) to currency.
static MARKET_CURRENCIES: &[(&str, &str)] = &[
    ("L", "GBP"), ("IL", "GBP"),
    ("DE", "EUR"), ("F", "EUR"), ("BE", "EUR"), ("MU", "EUR"),
    ("PA", "EUR"), ("AS", "EUR"), ("BR", "EUR"), ("MI", "EUR"),
    ("MC", "EUR"), ("LS", "EUR"), ("VI", "EUR"), ("HE", "EUR"),
    ("IR", "EUR"),
    ("T", "JPY"), ("SW", "CHF"), ("TO", "CAD"), ("V", "CAD"),
    ("NE", "CAD"), ("AX", "AUD"), ("NZ", "NZD"), ("SS", "CNY"),
    ("SZ", "CNY"), ("HK", "HKD"), ("SI", "SGD"), ("NS", "INR"),
    ("BO", "INR"), ("KS", "KRW"), ("KQ", "KRW"), ("ST", "SEK"),
    ("OL", "NOK"), ("CO", "DKK"), ("WA", "PLN"), ("PR", "CZK"),
    ("BD", "HUF"), ("SA", "BRL"), ("MX", "MXN"), ("JO", "ZAR"),
    ("IS", "TRY"), ("ME", "RUB"), ("TA", "ILS"), ("SR", "SAR"),
    ("BK", "THB"), ("JK", "IDR"), ("KL", "MYR"), ("TW", "TWD"),
    ("TWO", "TWD"), ("SN", "CLP"), ("IC", "ISK"),
];

fn table_currency(code: &str) -> FxResult<Currency> {
    Ok(Currency::parse(code)?)
}

/// Maps country codes and ticker symbols to currencies.
///
/// Lookup counters let callers verify which tables a detection consulted.
#[derive(Debug, Default)]
pub struct CurrencyDetector {
    country_lookups: AtomicU64,
    market_lookups: AtomicU64,
}

impl CurrencyDetector {
    /// Create a new detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Currency of an ISO 3166-1 alpha-2 country code.
    pub fn from_country_code(&self, code: &str) -> FxResult<Currency> {
        self.country_lookups.fetch_add(1, Ordering::Relaxed);
        let normalized = code.trim().to_ascii_uppercase();

        COUNTRY_CURRENCIES
            .iter()
            .find(|(country, _)| *country == normalized)
            .map(|(_, currency)| table_currency(currency))
            .unwrap_or_else(|| Err(FxError::UnknownCountry(code.to_string())))
    }

    /// Currency of the exchange a ticker trades on, from its suffix.
    ///
    /// `VOD.L` trades in London (GBP). Symbols without a suffix, or with an
    /// unrecognized one such as the share class in `BRK.B`, default to USD.
    pub fn from_market_symbol(&self, symbol: &str) -> FxResult<Currency> {
        self.market_lookups.fetch_add(1, Ordering::Relaxed);
        let symbol = symbol.trim();

        let suffix = match symbol.rsplit_once('.') {
            Some((_, suffix)) => suffix.to_ascii_uppercase(),
            None => return Ok(Currency::usd()),
        };

        match MARKET_CURRENCIES.iter().find(|(s, _)| *s == suffix) {
            Some((_, currency)) => table_currency(currency),
            None => {
                debug!(symbol, suffix = %suffix, "Unrecognized market suffix, defaulting to USD");
                Ok(Currency::usd())
            }
        }
    }

    /// Detect from whichever inputs are present.
    ///
    /// A country code always wins: when one is given the market table is not
    /// consulted, even if the country is unknown. With neither input the
    /// result is USD.
    pub fn detect(&self, country: Option<&str>, symbol: Option<&str>) -> FxResult<Currency> {
        match (country, symbol) {
            (Some(country), _) => self.from_country_code(country),
            (None, Some(symbol)) => self.from_market_symbol(symbol),
            (None, None) => Ok(Currency::usd()),
        }
    }

    /// Lookup counters.
    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            country_lookups: self.country_lookups.load(Ordering::Relaxed),
            market_lookups: self.market_lookups.load(Ordering::Relaxed),
        }
    }
}

/// Detector lookup counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectorStats {
    pub country_lookups: u64,
    pub market_lookups: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_only_hold_known_currencies() {
        for (_, code) in COUNTRY_CURRENCIES.iter().chain(MARKET_CURRENCIES) {
            assert!(Currency::parse(code).is_ok(), "{}", code);
        }
    }

    #[test]
    fn test_from_country_code() {
        let detector = CurrencyDetector::new();

        assert_eq!(detector.from_country_code("GB").unwrap(), Currency::gbp());
        assert_eq!(detector.from_country_code("jp").unwrap(), Currency::jpy());
        assert_eq!(detector.from_country_code("DE").unwrap(), Currency::eur());
        assert_eq!(
            detector.from_country_code("ZZ"),
            Err(FxError::UnknownCountry("ZZ".to_string()))
        );
    }

    #[test]
    fn test_from_market_symbol() {
        let detector = CurrencyDetector::new();

        assert_eq!(detector.from_market_symbol("VOD.L").unwrap(), Currency::gbp());
        assert_eq!(detector.from_market_symbol("7203.T").unwrap(), Currency::jpy());
        assert_eq!(detector.from_market_symbol("SHOP.TO").unwrap().code(), "CAD");
        assert_eq!(detector.from_market_symbol("sap.de").unwrap(), Currency::eur());
        assert_eq!(detector.from_market_symbol("AAPL").unwrap(), Currency::usd());
        assert_eq!(detector.from_market_symbol("BRK.B").unwrap(), Currency::usd());
    }

    #[test]
    fn test_suffix_is_after_last_dot() {
        let detector = CurrencyDetector::new();
        assert_eq!(detector.from_market_symbol("BT.A.L").unwrap(), Currency::gbp());
    }

    #[test]
    fn test_country_wins_without_market_lookup() {
        let detector = CurrencyDetector::new();

        let combined = detector.detect(Some("JP"), Some("VOD.L")).unwrap();
        let country_only = detector.from_country_code("JP").unwrap();

        assert_eq!(combined, country_only);
        assert_eq!(detector.stats().market_lookups, 0);
        assert_eq!(detector.stats().country_lookups, 2);
    }

    #[test]
    fn test_unknown_country_does_not_fall_back_to_market() {
        let detector = CurrencyDetector::new();

        let result = detector.detect(Some("ZZ"), Some("VOD.L"));

        assert!(matches!(result, Err(FxError::UnknownCountry(_))));
        assert_eq!(detector.stats().market_lookups, 0);
    }

    #[test]
    fn test_market_used_without_country() {
        let detector = CurrencyDetector::new();

        assert_eq!(detector.detect(None, Some("VOD.L")).unwrap(), Currency::gbp());
        assert_eq!(detector.detect(None, None).unwrap(), Currency::usd());
        assert_eq!(detector.stats().market_lookups, 1);
    }
}
