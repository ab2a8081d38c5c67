//! Static ISO 4217 currency table.

/// Reference data for a supported currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyInfo {
    /// ISO 4217 alphabetic code.
    pub code: &'static str,
    /// Number of minor-unit digits.
    pub decimal_places: u32,
    /// Display symbol.
    pub symbol: &'static str,
    /// English name.
    pub name: &'static str,
}

const fn info(
    code: &'static str,
    decimal_places: u32,
    symbol: &'static str,
    name: &'static str,
) -> CurrencyInfo {
    CurrencyInfo {
        code,
        decimal_places,
        symbol,
        name,
    }
}

/// Every currency the engine accepts.
pub static CURRENCIES: &[CurrencyInfo] = &[
    info("USD", 2, "$", "US Dollar"),
    info("EUR", 2, "€", "Euro"),
    info("GBP", 2, "£", "British Pound"),
    info("JPY", 0, "¥", "Japanese Yen"),
    info("CHF", 2, "CHF", "Swiss Franc"),
    info("CAD", 2, "C$", "Canadian Dollar"),
    info("AUD", 2, "A$", "Australian Dollar"),
    info("NZD", 2, "NZ$", "New Zealand Dollar"),
    info("CNY", 2, "¥", "Chinese Yuan"),
    info("HKD", 2, "HK$", "Hong Kong Dollar"),
    info("SGD", 2, "S$", "Singapore Dollar"),
    info("INR", 2, "₹", "Indian Rupee"),
    info("KRW", 0, "₩", "South Korean Won"),
    info("SEK", 2, "kr", "Swedish Krona"),
    info("NOK", 2, "kr", "Norwegian Krone"),
    info("DKK", 2, "kr", "Danish Krone"),
    info("PLN", 2, "zł", "Polish Zloty"),
    info("CZK", 2, "Kč", "Czech Koruna"),
    info("HUF", 2, "Ft", "Hungarian Forint"),
    info("BRL", 2, "R$", "Brazilian Real"),
    info("MXN", 2, "MX$", "Mexican Peso"),
    info("ZAR", 2, "R", "South African Rand"),
    info("TRY", 2, "₺", "Turkish Lira"),
    info("RUB", 2, "₽", "Russian Ruble"),
    info("ILS", 2, "₪", "Israeli New Shekel"),
    info("AED", 2, "د.إ", "UAE Dirham"),
    info("SAR", 2, "﷼", "Saudi Riyal"),
    info("THB", 2, "฿", "Thai Baht"),
    info("IDR", 2, "Rp", "Indonesian Rupiah"),
    info("MYR", 2, "RM", "Malaysian Ringgit"),
    info("PHP", 2, "₱", "Philippine Peso"),
    info("TWD", 2, "NT$", "New Taiwan Dollar"),
    info("VND", 0, "₫", "Vietnamese Dong"),
    info("CLP", 0, "CLP$", "Chilean Peso"),
    info("ISK", 0, "kr", "Icelandic Krona"),
    info("BHD", 3, "BD", "Bahraini Dinar"),
    info("KWD", 3, "KD", "Kuwaiti Dinar"),
    info("OMR", 3, "OMR", "Omani Rial"),
    info("JOD", 3, "JD", "Jordanian Dinar"),
];

/// Look up a currency by its (already upper-cased) code.
pub fn lookup(code: &str) -> Option<&'static CurrencyInfo> {
    CURRENCIES.iter().find(|c| c.code == code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique_and_well_formed() {
        let mut seen = HashSet::new();
        for c in CURRENCIES {
            assert_eq!(c.code.len(), 3, "{}", c.code);
            assert!(c.code.chars().all(|ch| ch.is_ascii_uppercase()));
            assert!(seen.insert(c.code), "duplicate {}", c.code);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("JPY").map(|c| c.decimal_places), Some(0));
        assert_eq!(lookup("KWD").map(|c| c.decimal_places), Some(3));
        assert!(lookup("usd").is_none());
        assert!(lookup("XXX").is_none());
    }
}
