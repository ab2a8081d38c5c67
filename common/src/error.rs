//! Error types for Moneta monetary primitives.

use thiserror::Error;

use crate::Currency;

/// Errors raised while constructing or combining monetary values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Code is malformed or not in the currency table.
    #[error("Invalid currency code: {0}")]
    InvalidCurrencyCode(String),

    /// Two amounts in different currencies were combined.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: Currency, actual: Currency },

    /// A balance or principal was negative.
    #[error("Amount must not be negative: {0}")]
    NegativeAmount(String),

    /// Exchange rates must be strictly positive.
    #[error("Exchange rate must be positive, got {0}")]
    NonPositiveRate(String),

    /// Arithmetic left the representable decimal range.
    #[error("Amount overflow: {0}")]
    Overflow(String),
}

impl CommonError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommonError::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            CommonError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            CommonError::NegativeAmount(_) => "NEGATIVE_AMOUNT",
            CommonError::NonPositiveRate(_) => "NON_POSITIVE_RATE",
            CommonError::Overflow(_) => "AMOUNT_OVERFLOW",
        }
    }
}

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;
