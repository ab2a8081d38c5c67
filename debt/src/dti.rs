//! Debt-to-income ratio and risk tier.

use moneta_common::{round_half_even, CommonError, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DebtError, DebtResult};
use crate::loan::Loan;

/// Ratio at or below which debt load is low, in percent.
const LOW_THRESHOLD: Decimal = Decimal::from_parts(20, 0, 0, false, 0);
/// Ratio at or below which debt load is medium, in percent.
const MEDIUM_THRESHOLD: Decimal = Decimal::from_parts(36, 0, 0, false, 0);

/// Qualitative debt load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Tier for a ratio in percent.
    pub fn for_ratio(ratio: Decimal) -> Self {
        if ratio <= LOW_THRESHOLD {
            RiskTier::Low
        } else if ratio <= MEDIUM_THRESHOLD {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }

    /// Advice for this tier.
    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskTier::Low => "Debt load is healthy. Keep making payments on schedule.",
            RiskTier::Medium => {
                "Debt load is manageable. Avoid new borrowing and direct extra cash to the costliest loan."
            }
            RiskTier::High => {
                "Debt load is high. Prioritize paying down balances before taking on new credit."
            }
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

/// Shown instead of the tier advice when income is zero.
pub const ADD_INCOME_RECOMMENDATION: &str =
    "Add income data to get a meaningful debt-to-income assessment.";

/// `payments / income` as a percent, rounded half-even to 2 places.
///
/// Zero income yields `0`: the ratio is unavailable, not infinite.
pub fn ratio(monthly_income: Decimal, total_monthly_payments: Decimal) -> DebtResult<Decimal> {
    if monthly_income.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let percent = total_monthly_payments
        .checked_div(monthly_income)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| {
            CommonError::Overflow(format!("{} / {}", total_monthly_payments, monthly_income))
        })?;
    Ok(round_half_even(percent, 2))
}

/// Debt-to-income summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DtiAssessment {
    pub monthly_income: Money,
    pub total_monthly_payments: Money,
    /// Percent; `0` when income is zero.
    pub ratio: Decimal,
    pub risk_tier: RiskTier,
    pub recommendation: String,
}

/// Assess amounts already summed. Both must be non-negative.
pub fn assess_amounts(monthly_income: Money, total_monthly_payments: Money) -> DebtResult<DtiAssessment> {
    if monthly_income.currency != total_monthly_payments.currency {
        return Err(DebtError::CurrencyMismatch {
            expected: monthly_income.currency.clone(),
            actual: total_monthly_payments.currency.clone(),
        });
    }
    let monthly_income = Money::non_negative(monthly_income.value, monthly_income.currency)?;
    let total_monthly_payments =
        Money::non_negative(total_monthly_payments.value, total_monthly_payments.currency)?;

    let ratio = ratio(monthly_income.value, total_monthly_payments.value)?;
    let (risk_tier, recommendation) = if monthly_income.is_zero() {
        (RiskTier::Medium, ADD_INCOME_RECOMMENDATION)
    } else {
        let tier = RiskTier::for_ratio(ratio);
        (tier, tier.recommendation())
    };

    Ok(DtiAssessment {
        monthly_income,
        total_monthly_payments,
        ratio,
        risk_tier,
        recommendation: recommendation.to_string(),
    })
}

/// Assess income against the minimum payments of every open loan.
pub fn assess(monthly_income: &Money, loans: &[Loan]) -> DebtResult<DtiAssessment> {
    let mut payments = Money::zero(monthly_income.currency.clone());
    for loan in loans.iter().filter(|l| l.is_open()) {
        loan.validate()?;
        payments = payments.checked_add(&loan.monthly_payment)?;
    }

    assess_amounts(monthly_income.clone(), payments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::fixtures::loan;
    use moneta_common::Currency;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn usd(value: Decimal) -> Money {
        Money::new(value, Currency::usd())
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(dec!(5000), dec!(1000)).unwrap(), dec!(20));
        assert_eq!(ratio(dec!(3000), dec!(1000)).unwrap(), dec!(33.33));
        assert_eq!(ratio(dec!(0), dec!(1000)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_ratio_overflow_is_an_error() {
        let result = ratio(dec!(0.01), Decimal::MAX);

        assert!(matches!(result, Err(DebtError::Monetary(CommonError::Overflow(_)))));
    }

    #[test]
    fn test_negative_income_rejected() {
        let loans = vec![loan("a", dec!(1000), dec!(5), dec!(300))];

        let result = assess(&usd(dec!(-4000)), &loans);

        assert!(matches!(result, Err(DebtError::Monetary(CommonError::NegativeAmount(_)))));
        assert!(assess_amounts(usd(dec!(-1)), usd(dec!(0))).is_err());
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskTier::for_ratio(dec!(20)), RiskTier::Low);
        assert_eq!(RiskTier::for_ratio(dec!(20.01)), RiskTier::Medium);
        assert_eq!(RiskTier::for_ratio(dec!(36)), RiskTier::Medium);
        assert_eq!(RiskTier::for_ratio(dec!(36.01)), RiskTier::High);
    }

    #[test]
    fn test_zero_income_forces_medium() {
        let assessment = assess_amounts(usd(dec!(0)), usd(dec!(5000))).unwrap();

        assert_eq!(assessment.ratio, Decimal::ZERO);
        assert_eq!(assessment.risk_tier, RiskTier::Medium);
        assert_eq!(assessment.recommendation, ADD_INCOME_RECOMMENDATION);
    }

    #[test]
    fn test_assess_sums_open_loans() {
        let loans = vec![
            loan("a", dec!(1000), dec!(5), dec!(300)),
            loan("b", dec!(0), dec!(5), dec!(999)),
            loan("c", dec!(2000), dec!(5), dec!(700)),
        ];

        let assessment = assess(&usd(dec!(4000)), &loans).unwrap();

        assert_eq!(assessment.total_monthly_payments.value, dec!(1000));
        assert_eq!(assessment.ratio, dec!(25));
        assert_eq!(assessment.risk_tier, RiskTier::Medium);
        assert_eq!(assessment.recommendation, RiskTier::Medium.recommendation());
    }

    #[test]
    fn test_assess_currency_mismatch() {
        let loans = vec![loan("a", dec!(1000), dec!(5), dec!(300))];
        let income = Money::new(dec!(4000), Currency::eur());

        assert!(matches!(assess(&income, &loans), Err(DebtError::CurrencyMismatch { .. })));
    }

    proptest! {
        #[test]
        fn prop_zero_income_ratio_is_zero(cents in 0i64..1_000_000_000) {
            let payments = Decimal::new(cents, 2);
            prop_assert_eq!(ratio(Decimal::ZERO, payments).unwrap(), Decimal::ZERO);

            let assessment = assess_amounts(usd(Decimal::ZERO), usd(payments)).unwrap();
            prop_assert_eq!(assessment.risk_tier, RiskTier::Medium);
        }

        #[test]
        fn prop_tier_is_monotonic(a in 0u32..10_000, b in 0u32..10_000) {
            let (lo, hi) = (a.min(b), a.max(b));
            let lo = RiskTier::for_ratio(Decimal::new(lo as i64, 2));
            let hi = RiskTier::for_ratio(Decimal::new(hi as i64, 2));
            let rank = |t: RiskTier| match t {
                RiskTier::Low => 0,
                RiskTier::Medium => 1,
                RiskTier::High => 2,
            };
            prop_assert!(rank(lo) <= rank(hi));
        }
    }
}
