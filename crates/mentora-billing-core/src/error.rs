//! Billing engine errors

use thiserror::Error;

use mentora_ledger::LedgerError;
use mentora_types::Amount;

/// Result alias for billing operations
pub type BillingResult<T> = Result<T, BillingError>;

/// Billing engine errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Session not found in the registry
    #[error("session not found")]
    SessionNotFound,

    /// Client balance below the required amount
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount the operation needed
        required: Amount,
        /// Balance the client actually had
        available: Amount,
    },

    /// Per-minute rate must be non-negative
    #[error("invalid rate: {0}")]
    InvalidRate(Amount),

    /// Amount arithmetic overflowed
    #[error("amount arithmetic overflowed")]
    AmountOverflow,

    /// Ledger operation failed
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl BillingError {
    /// Check if error is an insufficient funds refusal
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, BillingError::InsufficientFunds { .. })
    }

    /// Check if error is a session lookup miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, BillingError::SessionNotFound)
    }

    /// Check if error is worth retrying on a later cycle
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Ledger(e) if e.is_retryable())
    }
}
