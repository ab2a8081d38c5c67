//! Debt engine error types.

use moneta_common::{CommonError, Currency};
use thiserror::Error;

use crate::loan::LoanId;

/// Errors that can occur in debt computations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DebtError {
    /// Loans (or a loan's own amounts) are in different currencies.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// Loan fields violate an invariant.
    #[error("Invalid loan {id}: {reason}")]
    InvalidLoan { id: LoanId, reason: String },

    /// Loan or income snapshot could not be read.
    #[error("Repository error: {0}")]
    Repository(String),

    /// Monetary error.
    #[error(transparent)]
    Monetary(CommonError),
}

impl DebtError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            DebtError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            DebtError::InvalidLoan { .. } => "INVALID_LOAN",
            DebtError::Repository(_) => "REPOSITORY_ERROR",
            DebtError::Monetary(e) => e.error_code(),
        }
    }
}

impl From<CommonError> for DebtError {
    fn from(e: CommonError) -> Self {
        match e {
            CommonError::CurrencyMismatch { expected, actual } => {
                DebtError::CurrencyMismatch { expected, actual }
            }
            other => DebtError::Monetary(other),
        }
    }
}

/// Result type for debt operations.
pub type DebtResult<T> = std::result::Result<T, DebtError>;
