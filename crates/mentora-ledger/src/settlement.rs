//! Charge settlement over a non-transactional wallet store
//!
//! The wallet store guarantees single operations only, so one settlement is
//! a small saga: debit the client, credit the advisor net of commission,
//! record both audit entries. A failed advisor credit triggers a
//! compensating re-credit of the client; if the compensation also fails the
//! wallets are inconsistent and the error says so loudly.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, instrument, warn};

use mentora_types::{Amount, CommissionRate, UserId};

use crate::client::{LedgerClient, SessionCharge, Settlement};
use crate::error::{LedgerError, LedgerResult};
use crate::store::{TransactionEntry, TransactionKind, WalletStore};

/// Ledger client over a primitive wallet store
#[derive(Clone)]
pub struct SettlementLedger<S> {
    store: Arc<S>,
    commission: CommissionRate,
}

impl<S> SettlementLedger<S> {
    /// Create a settlement ledger with the platform commission rate
    pub fn new(store: Arc<S>, commission: CommissionRate) -> Self {
        Self { store, commission }
    }

    /// The configured commission rate
    pub fn commission(&self) -> CommissionRate {
        self.commission
    }
}

impl<S> std::fmt::Debug for SettlementLedger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementLedger")
            .field("commission", &self.commission)
            .finish_non_exhaustive()
    }
}

impl<S: WalletStore> SettlementLedger<S> {
    /// Re-credit the client after a failed advisor credit
    async fn compensate(&self, charge: &SessionCharge) -> LedgerResult<()> {
        self.store.credit(charge.client_id, charge.amount).await?;

        let reversal = TransactionEntry {
            session_id: charge.session_id.clone(),
            user_id: charge.client_id,
            kind: TransactionKind::Reversal,
            amount: charge.amount,
            recorded_at: Utc::now(),
        };
        // The money is already back; a missing reversal entry is an audit
        // gap, not an inconsistency.
        if let Err(e) = self.store.record(reversal).await {
            error!(
                session_id = %charge.session_id,
                client_id = %charge.client_id,
                error = %e,
                "failed to record reversal entry"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl<S: WalletStore> LedgerClient for SettlementLedger<S> {
    async fn get_balance(&self, user_id: UserId) -> LedgerResult<Amount> {
        self.store.balance(user_id).await
    }

    #[instrument(
        skip(self, charge),
        fields(
            session_id = %charge.session_id,
            client_id = %charge.client_id,
            advisor_id = %charge.advisor_id,
            amount = %charge.amount,
        )
    )]
    async fn settle_session_charge(&self, charge: &SessionCharge) -> LedgerResult<Settlement> {
        if charge.amount.is_negative() {
            return Err(LedgerError::Rejected(format!(
                "negative charge amount {}",
                charge.amount
            )));
        }

        debug!("settling session charge");

        self.store.debit(charge.client_id, charge.amount).await?;

        let advisor_credit = self.commission.advisor_share(charge.amount);
        let platform_fee = self.commission.platform_fee(charge.amount);

        if let Err(credit_err) = self.store.credit(charge.advisor_id, advisor_credit).await {
            warn!(
                error = %credit_err,
                "advisor credit failed after client debit, issuing compensating reversal"
            );
            return match self.compensate(charge).await {
                Ok(()) => Err(credit_err),
                Err(comp_err) => {
                    error!(
                        error = %comp_err,
                        "compensating reversal failed, wallets are inconsistent"
                    );
                    Err(LedgerError::ReconciliationRequired(format!(
                        "client {} debited {} for session {} but the reversal failed: {comp_err}",
                        charge.client_id, charge.amount, charge.session_id
                    )))
                }
            };
        }

        let recorded_at = Utc::now();
        let audit = [
            TransactionEntry {
                session_id: charge.session_id.clone(),
                user_id: charge.client_id,
                kind: TransactionKind::SessionCharge,
                amount: charge.amount,
                recorded_at,
            },
            TransactionEntry {
                session_id: charge.session_id.clone(),
                user_id: charge.advisor_id,
                kind: TransactionKind::SessionEarning,
                amount: advisor_credit,
                recorded_at,
            },
        ];
        // Entry recording never unwinds settled money movement.
        for entry in audit {
            if let Err(e) = self.store.record(entry).await {
                error!(
                    session_id = %charge.session_id,
                    error = %e,
                    "failed to record settlement audit entry"
                );
            }
        }

        Ok(Settlement {
            amount: charge.amount,
            advisor_credit,
            platform_fee,
        })
    }

    async fn ping(&self) -> LedgerResult<()> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentora_types::SessionId;

    use crate::memory::MemoryWalletStore;

    /// Wallet store that fails credits, optionally only for one user
    struct FailCreditStore {
        inner: MemoryWalletStore,
        deny: Option<UserId>,
    }

    #[async_trait]
    impl WalletStore for FailCreditStore {
        async fn balance(&self, user_id: UserId) -> LedgerResult<Amount> {
            self.inner.balance(user_id).await
        }

        async fn debit(&self, user_id: UserId, amount: Amount) -> LedgerResult<Amount> {
            self.inner.debit(user_id, amount).await
        }

        async fn credit(&self, user_id: UserId, amount: Amount) -> LedgerResult<Amount> {
            if self.deny.is_none() || self.deny == Some(user_id) {
                return Err(LedgerError::Unavailable("credit endpoint down".into()));
            }
            self.inner.credit(user_id, amount).await
        }

        async fn record(&self, entry: TransactionEntry) -> LedgerResult<()> {
            self.inner.record(entry).await
        }

        async fn ping(&self) -> LedgerResult<()> {
            self.inner.ping().await
        }
    }

    fn charge_of(client_id: UserId, advisor_id: UserId, cents: i64) -> SessionCharge {
        SessionCharge {
            session_id: SessionId::new("room-1"),
            client_id,
            advisor_id,
            amount: Amount::from_cents(cents),
        }
    }

    fn commission(bps: u32) -> CommissionRate {
        CommissionRate::from_basis_points(bps).unwrap()
    }

    #[tokio::test]
    async fn settle_splits_charge_between_wallets() {
        let store = MemoryWalletStore::new();
        let client = UserId::new();
        let advisor = UserId::new();
        store.open_wallet(client, Amount::from_cents(1000));

        let ledger = SettlementLedger::new(Arc::new(store.clone()), commission(2000));
        let receipt = ledger
            .settle_session_charge(&charge_of(client, advisor, 400))
            .await
            .unwrap();

        assert_eq!(receipt.amount, Amount::from_cents(400));
        assert_eq!(receipt.advisor_credit, Amount::from_cents(320));
        assert_eq!(receipt.platform_fee, Amount::from_cents(80));
        assert_eq!(store.balance(client).await.unwrap(), Amount::from_cents(600));
        assert_eq!(
            store.balance(advisor).await.unwrap(),
            Amount::from_cents(320)
        );

        let entries = store.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, TransactionKind::SessionCharge);
        assert_eq!(entries[0].user_id, client);
        assert_eq!(entries[1].kind, TransactionKind::SessionEarning);
        assert_eq!(entries[1].user_id, advisor);
        assert_eq!(entries[1].amount, Amount::from_cents(320));
    }

    #[tokio::test]
    async fn zero_commission_credits_full_amount() {
        let store = MemoryWalletStore::new();
        let client = UserId::new();
        let advisor = UserId::new();
        store.open_wallet(client, Amount::from_cents(1000));

        let ledger = SettlementLedger::new(Arc::new(store.clone()), commission(0));
        let receipt = ledger
            .settle_session_charge(&charge_of(client, advisor, 400))
            .await
            .unwrap();

        assert_eq!(receipt.advisor_credit, Amount::from_cents(400));
        assert_eq!(receipt.platform_fee, Amount::ZERO);
    }

    #[tokio::test]
    async fn rejected_debit_leaves_advisor_untouched() {
        let store = MemoryWalletStore::new();
        let client = UserId::new();
        let advisor = UserId::new();
        store.open_wallet(client, Amount::from_cents(100));

        let ledger = SettlementLedger::new(Arc::new(store.clone()), commission(2000));
        let err = ledger
            .settle_session_charge(&charge_of(client, advisor, 400))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Rejected(_)));
        assert_eq!(store.balance(client).await.unwrap(), Amount::from_cents(100));
        assert!(store.balance(advisor).await.unwrap_err().is_not_found());
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn credit_failure_reverses_client_debit() {
        let inner = MemoryWalletStore::new();
        let client = UserId::new();
        let advisor = UserId::new();
        inner.open_wallet(client, Amount::from_cents(1000));

        let store = FailCreditStore {
            inner: inner.clone(),
            deny: Some(advisor),
        };
        let ledger = SettlementLedger::new(Arc::new(store), commission(2000));
        let err = ledger
            .settle_session_charge(&charge_of(client, advisor, 400))
            .await
            .unwrap_err();

        // The original credit failure surfaces; the client is made whole.
        assert!(matches!(err, LedgerError::Unavailable(_)));
        assert_eq!(inner.balance(client).await.unwrap(), Amount::from_cents(1000));

        let entries = inner.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, TransactionKind::Reversal);
        assert_eq!(entries[0].user_id, client);
        assert_eq!(entries[0].amount, Amount::from_cents(400));
    }

    #[tokio::test]
    async fn compensation_failure_flags_reconciliation() {
        let inner = MemoryWalletStore::new();
        let client = UserId::new();
        let advisor = UserId::new();
        inner.open_wallet(client, Amount::from_cents(1000));

        let store = FailCreditStore {
            inner: inner.clone(),
            deny: None,
        };
        let ledger = SettlementLedger::new(Arc::new(store), commission(2000));
        let err = ledger
            .settle_session_charge(&charge_of(client, advisor, 400))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::ReconciliationRequired(_)));
        // The debit was retained; that is exactly the inconsistency the
        // error reports.
        assert_eq!(inner.balance(client).await.unwrap(), Amount::from_cents(600));
    }

    #[tokio::test]
    async fn get_balance_passes_through_not_found() {
        let store = MemoryWalletStore::new();
        let ledger = SettlementLedger::new(Arc::new(store), commission(2000));

        let err = ledger.get_balance(UserId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
