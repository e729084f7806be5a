//! Wallet store contract
//!
//! Primitive operations offered by the external balance store. The store
//! guarantees each single operation but no multi-statement transactions;
//! [`crate::SettlementLedger`] composes these primitives into a compensated
//! settlement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mentora_types::{Amount, SessionId, UserId};

use crate::error::LedgerResult;

/// Kind of transaction entry recorded against a wallet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Client debit for metered consultation time
    SessionCharge,
    /// Advisor credit for metered consultation time, net of commission
    SessionEarning,
    /// Compensating re-credit after a partial settlement failure
    Reversal,
}

/// An entry in the ledger's audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEntry {
    /// Session the entry belongs to
    pub session_id: SessionId,
    /// Wallet owner the entry applies to
    pub user_id: UserId,
    /// What the entry records
    pub kind: TransactionKind,
    /// Entry amount in cents, always non-negative
    pub amount: Amount,
    /// When the entry was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Primitive wallet operations
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Current balance for a wallet
    ///
    /// Fails with [`crate::LedgerError::NotFound`] when the user has no
    /// wallet record.
    async fn balance(&self, user_id: UserId) -> LedgerResult<Amount>;

    /// Debit a wallet, returning the new balance
    async fn debit(&self, user_id: UserId, amount: Amount) -> LedgerResult<Amount>;

    /// Credit a wallet, returning the new balance
    async fn credit(&self, user_id: UserId, amount: Amount) -> LedgerResult<Amount>;

    /// Append an entry to the audit trail
    async fn record(&self, entry: TransactionEntry) -> LedgerResult<()>;

    /// Cheap reachability probe
    async fn ping(&self) -> LedgerResult<()>;
}
