//! In-memory wallet store
//!
//! DashMap-backed store for tests and the `memory` ledger backend in local
//! development. Balances and the audit trail live in process memory and
//! vanish on exit.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;

use mentora_types::{Amount, UserId};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{TransactionEntry, WalletStore};

/// In-memory wallet store
#[derive(Default, Clone)]
pub struct MemoryWalletStore {
    wallets: Arc<DashMap<UserId, i64>>,
    entries: Arc<Mutex<Vec<TransactionEntry>>>,
    default_opening: Option<i64>,
}

impl MemoryWalletStore {
    /// Create an empty store where unknown wallets do not exist
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store where unknown wallets materialize with this balance
    ///
    /// Lets the in-process backend bill sessions without a wallet
    /// provisioning step.
    pub fn with_opening_balance(opening: Amount) -> Self {
        Self {
            default_opening: Some(opening.cents()),
            ..Self::default()
        }
    }

    /// Create a wallet with an opening balance, replacing any existing one
    pub fn open_wallet(&self, user_id: UserId, opening: Amount) {
        self.wallets.insert(user_id, opening.cents());
    }

    /// Snapshot of the recorded audit trail
    pub fn entries(&self) -> Vec<TransactionEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
    async fn balance(&self, user_id: UserId) -> LedgerResult<Amount> {
        match self.wallets.get(&user_id) {
            Some(cents) => Ok(Amount::from_cents(*cents)),
            None => self
                .default_opening
                .map(Amount::from_cents)
                .ok_or(LedgerError::NotFound),
        }
    }

    async fn debit(&self, user_id: UserId, amount: Amount) -> LedgerResult<Amount> {
        if amount.is_negative() {
            return Err(LedgerError::Rejected(format!(
                "negative debit amount {amount}"
            )));
        }
        let mut wallet = match self.default_opening {
            Some(opening) => self.wallets.entry(user_id).or_insert(opening),
            None => self.wallets.get_mut(&user_id).ok_or(LedgerError::NotFound)?,
        };
        if *wallet < amount.cents() {
            return Err(LedgerError::Rejected(format!(
                "balance {} below debit {amount}",
                Amount::from_cents(*wallet)
            )));
        }
        *wallet -= amount.cents();
        Ok(Amount::from_cents(*wallet))
    }

    async fn credit(&self, user_id: UserId, amount: Amount) -> LedgerResult<Amount> {
        if amount.is_negative() {
            return Err(LedgerError::Rejected(format!(
                "negative credit amount {amount}"
            )));
        }
        // Credits create the wallet on first use; advisors may have never
        // been paid before.
        let mut wallet = self.wallets.entry(user_id).or_insert(0);
        *wallet += amount.cents();
        Ok(Amount::from_cents(*wallet))
    }

    async fn record(&self, entry: TransactionEntry) -> LedgerResult<()> {
        self.entries
            .lock()
            .map_err(|_| LedgerError::Protocol("audit trail lock poisoned".into()))?
            .push(entry);
        Ok(())
    }

    async fn ping(&self) -> LedgerResult<()> {
        Ok(())
    }
}
