//! Ledger client contract
//!
//! The narrow interface the billing engine consumes: read a balance, settle
//! one charge. Everything else about the balance store stays behind it.

use async_trait::async_trait;

use mentora_types::{Amount, SessionId, UserId};

use crate::error::LedgerResult;

/// One charge to settle for a metered session
#[derive(Debug, Clone)]
pub struct SessionCharge {
    /// Session the charge belongs to
    pub session_id: SessionId,
    /// Client being debited
    pub client_id: UserId,
    /// Advisor being credited
    pub advisor_id: UserId,
    /// Gross charge amount
    pub amount: Amount,
}

/// Receipt for a settled charge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Gross amount debited from the client
    pub amount: Amount,
    /// Amount credited to the advisor, net of commission
    pub advisor_credit: Amount,
    /// Platform's cut of the charge
    pub platform_fee: Amount,
}

/// Balance reads and charge settlement against the external balance store
///
/// Settlement is all-or-nothing from the caller's perspective: an `Err`
/// return means no debit was retained, so the caller may safely retry the
/// same charge on its next cycle.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current balance for a user
    ///
    /// Fails with [`crate::LedgerError::NotFound`] when no balance record
    /// exists; callers treat that as a zero balance.
    async fn get_balance(&self, user_id: UserId) -> LedgerResult<Amount>;

    /// Settle one charge: debit the client, credit the advisor net of
    /// commission, record both audit entries
    async fn settle_session_charge(&self, charge: &SessionCharge) -> LedgerResult<Settlement>;

    /// Reachability probe used at startup and by readiness checks
    async fn ping(&self) -> LedgerResult<()>;
}
