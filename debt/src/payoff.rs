//! Snowball and avalanche payoff strategies.
//!
//! Both strategies pay every loan's minimum each month and differ only in
//! where the freed-up budget of paid-off loans goes. The simulation accrues a
//! month of interest on every open balance, pays minimums, then rolls the
//! rest of the budget into loans in priority order.

use moneta_common::{CommonError, Currency, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::config::PayoffConfig;
use crate::error::{DebtError, DebtResult};
use crate::loan::{Loan, LoanId};

/// Payoff ordering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Smallest balance first.
    Snowball,
    /// Highest interest rate first.
    Avalanche,
}

impl Strategy {
    /// Loans in payoff priority order. Ties break by loan id.
    pub fn order<'a>(&self, loans: &'a [Loan]) -> Vec<&'a Loan> {
        let mut ordered: Vec<&Loan> = loans.iter().collect();
        match self {
            Strategy::Snowball => ordered.sort_by(|a, b| {
                a.current_balance
                    .value
                    .cmp(&b.current_balance.value)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            Strategy::Avalanche => ordered.sort_by(|a, b| {
                b.interest_rate
                    .cmp(&a.interest_rate)
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }
        ordered
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Snowball => write!(f, "snowball"),
            Strategy::Avalanche => write!(f, "avalanche"),
        }
    }
}

/// When one loan is cleared under a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanPayoff {
    pub loan_id: LoanId,
    pub name: String,
    /// Month the balance reached zero; `None` if the horizon was hit first.
    pub payoff_month: Option<u32>,
    pub interest_paid: Decimal,
}

/// Result of simulating one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoffPlan {
    pub strategy: Strategy,
    /// Currency of every amount in the plan; `None` when there was nothing to pay.
    pub currency: Option<Currency>,
    /// Sum of all minimum payments, paid every month until everything clears.
    pub monthly_budget: Decimal,
    pub order: Vec<LoanId>,
    pub total_interest: Decimal,
    /// Month the last loan cleared, or the horizon if it never did.
    pub payoff_months: u32,
    /// The simulation stopped at the horizon with balances outstanding.
    pub horizon_exceeded: bool,
    /// Per-loan outcome, in priority order.
    pub payoff_schedule: Vec<LoanPayoff>,
}

impl PayoffPlan {
    fn empty(strategy: Strategy) -> Self {
        Self {
            strategy,
            currency: None,
            monthly_budget: Decimal::ZERO,
            order: Vec::new(),
            total_interest: Decimal::ZERO,
            payoff_months: 0,
            horizon_exceeded: false,
            payoff_schedule: Vec::new(),
        }
    }

    /// Horizon warning, if any.
    pub fn warning(&self) -> Option<String> {
        self.horizon_exceeded.then(|| {
            format!(
                "Loans are not paid off within {} months at current payments",
                self.payoff_months
            )
        })
    }
}

/// Both strategies side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoffComparison {
    pub snowball: PayoffPlan,
    pub avalanche: PayoffPlan,
    /// Snowball interest minus avalanche interest.
    pub interest_saved_by_avalanche: Decimal,
    pub recommended: Strategy,
}

/// Orders loans and simulates amortization.
#[derive(Debug, Clone, Default)]
pub struct PayoffStrategist {
    config: PayoffConfig,
}

impl PayoffStrategist {
    /// Create a strategist with the given configuration.
    pub fn new(config: PayoffConfig) -> Self {
        Self { config }
    }

    /// Simulate one strategy over the open loans in `loans`.
    ///
    /// A month whose arithmetic leaves the decimal range ends the simulation
    /// as if the horizon had been reached.
    #[instrument(skip(self, loans), fields(loans = loans.len()))]
    pub fn plan(&self, loans: &[Loan], strategy: Strategy) -> DebtResult<PayoffPlan> {
        let open = open_loans(loans)?;
        let ordered = strategy.order(&open);
        let Some(currency) = open.first().map(|l| l.currency().clone()) else {
            return Ok(PayoffPlan::empty(strategy));
        };

        let zero = Money::zero(currency.clone());
        let budget = ordered
            .iter()
            .try_fold(zero.clone(), |sum, l| sum.checked_add(&l.monthly_payment))?;
        let mut ledger = Ledger {
            balances: ordered.iter().map(|l| l.current_balance.clone()).collect(),
            interest: vec![zero.clone(); ordered.len()],
        };
        let mut cleared: Vec<Option<u32>> = vec![None; ordered.len()];

        let mut month = 0;
        while month < self.config.max_horizon_months && ledger.balances.iter().any(Money::is_positive) {
            ledger = match ledger.next_month(&ordered, &budget) {
                Ok(next) => next,
                Err(CommonError::Overflow(detail)) => {
                    warn!(%strategy, month = month + 1, %detail, "Balances overflowed, stopping simulation");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            month += 1;

            for (i, balance) in ledger.balances.iter().enumerate() {
                if balance.is_zero() && cleared[i].is_none() {
                    cleared[i] = Some(month);
                    debug!(loan_id = %ordered[i].id, month, "Loan paid off");
                }
            }
        }

        let horizon_exceeded = cleared.iter().any(Option::is_none);
        let payoff_months = if horizon_exceeded {
            self.config.max_horizon_months
        } else {
            cleared.iter().flatten().copied().max().unwrap_or(0)
        };
        let total_interest = ledger
            .interest
            .iter()
            .try_fold(zero, |sum, paid| sum.checked_add(paid))?;

        let payoff_schedule: Vec<LoanPayoff> = ordered
            .iter()
            .zip(cleared)
            .zip(&ledger.interest)
            .map(|((loan, payoff_month), paid)| LoanPayoff {
                loan_id: loan.id.clone(),
                name: loan.name.clone(),
                payoff_month,
                interest_paid: paid.value,
            })
            .collect();

        let plan = PayoffPlan {
            strategy,
            currency: Some(currency),
            monthly_budget: budget.value,
            order: ordered.iter().map(|l| l.id.clone()).collect(),
            total_interest: total_interest.value,
            payoff_months,
            horizon_exceeded,
            payoff_schedule,
        };

        if horizon_exceeded {
            warn!(
                %strategy,
                horizon = self.config.max_horizon_months,
                "Payoff horizon exceeded"
            );
        }

        Ok(plan)
    }

    /// Simulate both strategies and recommend one.
    ///
    /// A plan that clears within the horizon beats one that does not; then
    /// lower total interest wins; a tie goes to snowball.
    pub fn compare(&self, loans: &[Loan]) -> DebtResult<PayoffComparison> {
        let snowball = self.plan(loans, Strategy::Snowball)?;
        let avalanche = self.plan(loans, Strategy::Avalanche)?;
        let saved = snowball.total_interest - avalanche.total_interest;

        let recommended = match (snowball.horizon_exceeded, avalanche.horizon_exceeded) {
            (true, false) => Strategy::Avalanche,
            (false, true) => Strategy::Snowball,
            _ if saved > Decimal::ZERO => Strategy::Avalanche,
            _ => Strategy::Snowball,
        };

        info!(
            snowball_months = snowball.payoff_months,
            avalanche_months = avalanche.payoff_months,
            interest_saved = %saved,
            %recommended,
            "Payoff strategies compared"
        );

        Ok(PayoffComparison {
            snowball,
            avalanche,
            interest_saved_by_avalanche: saved,
            recommended,
        })
    }
}

/// Per-loan balances and interest charged so far, in priority order.
#[derive(Debug, Clone)]
struct Ledger {
    balances: Vec<Money>,
    interest: Vec<Money>,
}

impl Ledger {
    /// Accrue a month of interest on every open balance, pay minimums, then
    /// roll the rest of `budget` into loans in order.
    fn next_month(&self, ordered: &[&Loan], budget: &Money) -> moneta_common::Result<Ledger> {
        let mut next = self.clone();

        for (i, loan) in ordered.iter().enumerate() {
            if next.balances[i].is_positive() {
                let charged = loan.monthly_interest(&next.balances[i])?;
                next.balances[i] = next.balances[i].checked_add(&charged)?;
                next.interest[i] = next.interest[i].checked_add(&charged)?;
            }
        }

        let mut remaining = budget.clone();
        for (i, loan) in ordered.iter().enumerate() {
            let payment = loan.monthly_payment.clone().min(next.balances[i].clone())?;
            next.balances[i] = next.balances[i].checked_sub(&payment)?;
            remaining = remaining.checked_sub(&payment)?;
        }

        for balance in next.balances.iter_mut() {
            if !remaining.is_positive() {
                break;
            }
            let extra = remaining.clone().min(balance.clone())?;
            *balance = balance.checked_sub(&extra)?;
            remaining = remaining.checked_sub(&extra)?;
        }

        Ok(next)
    }
}

/// Validated loans with an outstanding balance, all in one currency.
fn open_loans(loans: &[Loan]) -> DebtResult<Vec<Loan>> {
    let mut open: Vec<Loan> = Vec::with_capacity(loans.len());

    for loan in loans {
        loan.validate()?;
        if !loan.is_open() {
            continue;
        }
        if let Some(first) = open.first() {
            if first.currency() != loan.currency() {
                return Err(DebtError::CurrencyMismatch {
                    expected: first.currency().clone(),
                    actual: loan.currency().clone(),
                });
            }
        }
        open.push(loan.clone());
    }

    Ok(open)
}
