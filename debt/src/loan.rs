//! Read-only loan view.

use chrono::NaiveDate;
use moneta_common::{Currency, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DebtError, DebtResult};

/// Identifier of a loan. Ordered lexicographically, which breaks ties in
/// payoff orderings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(String);

impl LoanId {
    /// Create a new loan ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's loan as read from persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub name: String,
    /// Amount originally borrowed.
    pub principal: Money,
    /// Amount still owed.
    pub current_balance: Money,
    /// Annual interest rate in percent (`7.5` means 7.5% APR).
    pub interest_rate: Decimal,
    /// Minimum monthly payment.
    pub monthly_payment: Money,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub next_payment_date: Option<NaiveDate>,
}

impl Loan {
    /// Currency the loan is denominated in.
    pub fn currency(&self) -> &Currency {
        &self.current_balance.currency
    }

    /// True while a balance is outstanding.
    pub fn is_open(&self) -> bool {
        self.current_balance.is_positive()
    }

    /// Monthly rate as a fraction (`12%` APR gives `0.01`).
    pub fn monthly_rate(&self) -> Decimal {
        self.interest_rate / Decimal::ONE_HUNDRED / Decimal::from(12)
    }

    /// One month of interest on `balance`, rounded to minor units.
    pub fn monthly_interest(&self, balance: &Money) -> moneta_common::Result<Money> {
        Ok(balance.checked_mul(self.monthly_rate())?.round())
    }

    /// Check amounts are non-negative and share one currency.
    pub fn validate(&self) -> DebtResult<()> {
        for (field, amount) in [
            ("principal", &self.principal),
            ("current balance", &self.current_balance),
            ("monthly payment", &self.monthly_payment),
        ] {
            if amount.currency != *self.currency() {
                return Err(DebtError::CurrencyMismatch {
                    expected: self.currency().clone(),
                    actual: amount.currency.clone(),
                });
            }
            if amount.is_negative() {
                return Err(self.invalid(format!("{} is negative", field)));
            }
        }

        if self.interest_rate < Decimal::ZERO {
            return Err(self.invalid("interest rate is negative".to_string()));
        }

        Ok(())
    }

    fn invalid(&self, reason: String) -> DebtError {
        DebtError::InvalidLoan {
            id: self.id.clone(),
            reason,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// USD loan with principal equal to the balance.
    pub fn loan(id: &str, balance: Decimal, rate: Decimal, payment: Decimal) -> Loan {
        Loan {
            id: LoanId::new(id),
            name: format!("Loan {}", id),
            principal: Money::new(balance, Currency::usd()),
            current_balance: Money::new(balance, Currency::usd()),
            interest_rate: rate,
            monthly_payment: Money::new(payment, Currency::usd()),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            next_payment_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::loan;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_monthly_interest() {
        let l = loan("a", dec!(1000), dec!(12), dec!(50));

        assert_eq!(l.monthly_rate(), dec!(0.01));
        assert_eq!(l.monthly_interest(&l.current_balance).unwrap().value, dec!(10));
        // 333.33 * 0.005 = 1.66665 -> 1.67
        let l = loan("b", dec!(333.33), dec!(6), dec!(50));
        assert_eq!(l.monthly_interest(&l.current_balance).unwrap().value, dec!(1.67));
    }

    #[test]
    fn test_monthly_interest_overflow() {
        let l = loan("a", dec!(1000), dec!(2400), dec!(50));
        let huge = Money::new(Decimal::MAX, Currency::usd());

        assert!(matches!(
            l.monthly_interest(&huge),
            Err(moneta_common::CommonError::Overflow(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(loan("a", dec!(100), dec!(5), dec!(10)).validate().is_ok());

        let negative = loan("a", dec!(-1), dec!(5), dec!(10));
        assert!(matches!(negative.validate(), Err(DebtError::InvalidLoan { .. })));

        let mut mixed = loan("a", dec!(100), dec!(5), dec!(10));
        mixed.monthly_payment = Money::new(dec!(10), Currency::eur());
        assert!(matches!(mixed.validate(), Err(DebtError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{
            "id": "car",
            "name": "Car loan",
            "principal": {"value": "20000", "currency": "USD"},
            "current_balance": {"value": "12500.50", "currency": "USD"},
            "interest_rate": "6.9",
            "monthly_payment": {"value": "450", "currency": "USD"},
            "start_date": "2022-03-01"
        }"#;

        let l: Loan = serde_json::from_str(json).unwrap();

        assert_eq!(l.id.as_str(), "car");
        assert_eq!(l.current_balance.value, dec!(12500.50));
        assert!(l.next_payment_date.is_none());
        assert!(l.is_open());
    }
}
