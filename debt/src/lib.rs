//! Moneta Debt Engine
//!
//! Payoff strategies and debt-to-income assessment over a user's loans.
//!
//! # Features
//!
//! - Snowball and avalanche orderings with a monthly amortization simulation
//! - Debt-to-income ratio with a risk tier and recommendation
//! - Async repository contract for loan and income snapshots

pub mod config;
pub mod dti;
pub mod error;
pub mod loan;
pub mod payoff;
pub mod service;

pub use config::PayoffConfig;
pub use dti::{DtiAssessment, RiskTier};
pub use error::{DebtError, DebtResult};
pub use loan::{Loan, LoanId};
pub use payoff::{LoanPayoff, PayoffComparison, PayoffPlan, PayoffStrategist, Strategy};
pub use service::{DebtService, DebtSnapshot, InMemoryLoanRepository, LoanRepository};
