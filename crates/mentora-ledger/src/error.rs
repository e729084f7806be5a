//! Ledger errors

use thiserror::Error;

/// Result alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// No balance record exists for the user
    #[error("no balance record exists")]
    NotFound,

    /// The wallet store rejected the operation (e.g. overdraft, bad amount)
    #[error("wallet store rejected the operation: {0}")]
    Rejected(String),

    /// The wallet store could not be reached or timed out
    #[error("wallet store unavailable: {0}")]
    Unavailable(String),

    /// The wallet store answered with something unexpected
    #[error("wallet store protocol error: {0}")]
    Protocol(String),

    /// Client misconfiguration (bad credentials, unbuildable HTTP client)
    #[error("ledger client configuration error: {0}")]
    Config(String),

    /// A compensating reversal failed after a partial settlement; the wallets
    /// are inconsistent until an operator reconciles them
    #[error("settlement left wallets inconsistent, manual reconciliation required: {0}")]
    ReconciliationRequired(String),
}

impl LedgerError {
    /// Check if this is a missing-balance-record error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Check if a retry can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
