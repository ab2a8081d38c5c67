//! Debt service over a loan repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use moneta_common::{Currency, Money};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::config::PayoffConfig;
use crate::dti::{self, DtiAssessment};
use crate::error::DebtResult;
use crate::loan::Loan;
use crate::payoff::{PayoffComparison, PayoffStrategist};

/// Read access to a user's loans and income.
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// Loans the user is still paying.
    async fn active_loans(&self, user: &str) -> DebtResult<Vec<Loan>>;

    /// Monthly income, if the user has recorded one.
    async fn monthly_income(&self, user: &str) -> DebtResult<Option<Money>>;
}

/// One user's loans and income.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebtSnapshot {
    #[serde(default)]
    pub monthly_income: Option<Money>,
    #[serde(default)]
    pub loans: Vec<Loan>,
}

/// Loan repository held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLoanRepository {
    users: RwLock<HashMap<String, DebtSnapshot>>,
}

impl InMemoryLoanRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a user's snapshot.
    pub fn insert(&self, user: impl Into<String>, snapshot: DebtSnapshot) {
        self.users.write().insert(user.into(), snapshot);
    }

    /// Add a loan for a user.
    pub fn add_loan(&self, user: &str, loan: Loan) {
        self.users.write().entry(user.to_string()).or_default().loans.push(loan);
    }

    /// Set a user's monthly income.
    pub fn set_income(&self, user: &str, income: Money) {
        self.users.write().entry(user.to_string()).or_default().monthly_income = Some(income);
    }
}

#[async_trait]
impl LoanRepository for InMemoryLoanRepository {
    async fn active_loans(&self, user: &str) -> DebtResult<Vec<Loan>> {
        Ok(self
            .users
            .read()
            .get(user)
            .map(|s| s.loans.iter().filter(|l| l.is_open()).cloned().collect())
            .unwrap_or_default())
    }

    async fn monthly_income(&self, user: &str) -> DebtResult<Option<Money>> {
        Ok(self.users.read().get(user).and_then(|s| s.monthly_income.clone()))
    }
}

/// Payoff and DTI computations for a user.
pub struct DebtService {
    repository: Arc<dyn LoanRepository>,
    strategist: PayoffStrategist,
}

impl DebtService {
    /// Create a new debt service.
    pub fn new(repository: Arc<dyn LoanRepository>, config: PayoffConfig) -> Self {
        Self {
            repository,
            strategist: PayoffStrategist::new(config),
        }
    }

    /// Snowball and avalanche plans for a user's active loans.
    #[instrument(skip(self))]
    pub async fn payoff_strategies(&self, user: &str) -> DebtResult<PayoffComparison> {
        let loans = self.repository.active_loans(user).await?;
        self.strategist.compare(&loans)
    }

    /// Debt-to-income assessment for a user.
    ///
    /// Missing income counts as zero, in the currency of the first loan (USD
    /// when there are none).
    #[instrument(skip(self))]
    pub async fn debt_to_income(&self, user: &str) -> DebtResult<DtiAssessment> {
        let (loans, income) = tokio::try_join!(
            self.repository.active_loans(user),
            self.repository.monthly_income(user),
        )?;

        let income = income.unwrap_or_else(|| {
            let currency = loans.first().map(|l| l.currency().clone()).unwrap_or_else(Currency::usd);
            Money::zero(currency)
        });

        let assessment = dti::assess(&income, &loans)?;
        info!(
            ratio = %assessment.ratio,
            tier = %assessment.risk_tier,
            "Debt-to-income assessed"
        );
        Ok(assessment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dti::{RiskTier, ADD_INCOME_RECOMMENDATION};
    use crate::error::DebtError;
    use crate::loan::fixtures::loan;
    use crate::payoff::Strategy;
    use rust_decimal_macros::dec;

    struct FailingRepository;

    #[async_trait]
    impl LoanRepository for FailingRepository {
        async fn active_loans(&self, _user: &str) -> DebtResult<Vec<Loan>> {
            Err(DebtError::Repository("connection refused".to_string()))
        }

        async fn monthly_income(&self, _user: &str) -> DebtResult<Option<Money>> {
            Ok(None)
        }
    }

    fn service() -> (Arc<InMemoryLoanRepository>, DebtService) {
        let repo = Arc::new(InMemoryLoanRepository::new());
        let service = DebtService::new(repo.clone(), PayoffConfig::default());
        (repo, service)
    }

    #[tokio::test]
    async fn test_payoff_strategies() {
        let (repo, service) = service();
        repo.add_loan("alice", loan("1", dec!(5000), dec!(5), dec!(100)));
        repo.add_loan("alice", loan("2", dec!(1000), dec!(12), dec!(100)));
        repo.add_loan("alice", loan("3", dec!(3000), dec!(8), dec!(100)));
        repo.add_loan("alice", loan("4", dec!(0), dec!(30), dec!(100)));

        let comparison = service.payoff_strategies("alice").await.unwrap();

        assert_eq!(comparison.snowball.order.len(), 3);
        assert_eq!(comparison.snowball.strategy, Strategy::Snowball);
        assert_eq!(comparison.avalanche.strategy, Strategy::Avalanche);
        assert!(!comparison.snowball.horizon_exceeded);
    }

    #[tokio::test]
    async fn test_debt_to_income() {
        let (repo, service) = service();
        repo.add_loan("bob", loan("car", dec!(8000), dec!(6), dec!(400)));
        repo.set_income("bob", Money::new(dec!(1000), Currency::usd()));

        let assessment = service.debt_to_income("bob").await.unwrap();

        assert_eq!(assessment.ratio, dec!(40));
        assert_eq!(assessment.risk_tier, RiskTier::High);
    }

    #[tokio::test]
    async fn test_missing_income_is_zero() {
        let (repo, service) = service();
        repo.add_loan("carol", loan("card", dec!(800), dec!(22), dec!(50)));

        let assessment = service.debt_to_income("carol").await.unwrap();

        assert_eq!(assessment.ratio, dec!(0));
        assert_eq!(assessment.risk_tier, RiskTier::Medium);
        assert_eq!(assessment.recommendation, ADD_INCOME_RECOMMENDATION);
    }

    #[tokio::test]
    async fn test_unknown_user_has_nothing_to_pay() {
        let (_, service) = service();

        let comparison = service.payoff_strategies("nobody").await.unwrap();

        assert!(comparison.snowball.order.is_empty());
        assert_eq!(comparison.snowball.payoff_months, 0);
    }

    #[test]
    fn test_repository_error_propagates() {
        let service = DebtService::new(Arc::new(FailingRepository), PayoffConfig::default());

        let result = tokio_test::block_on(service.debt_to_income("dave"));

        assert!(matches!(result, Err(DebtError::Repository(_))));
    }
}
