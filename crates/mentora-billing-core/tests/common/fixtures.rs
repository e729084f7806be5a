//! Engine fixtures: in-memory ledgers, a failure-injecting wrapper, and a
//! fixed clock for deterministic cycle timing

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use mentora_billing_core::{BillingConfig, BillingEngine, EventPublisher, RoomHub};
use mentora_ledger::{
    LedgerClient, LedgerError, LedgerResult, MemoryWalletStore, SessionCharge, Settlement,
    SettlementLedger,
};
use mentora_types::{Amount, CommissionRate, UserId};

/// Settlement ledger over the in-memory wallet store
pub type MemoryLedger = SettlementLedger<MemoryWalletStore>;

/// Fixed test epoch plus an offset in seconds
pub fn t(plus_secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap() + chrono::Duration::seconds(plus_secs)
}

/// Ledger wrapper that fails a configured number of settlements before
/// letting them through; balance reads always pass through
pub struct FlakyLedger<L> {
    inner: L,
    failures_left: Mutex<u32>,
}

impl<L> FlakyLedger<L> {
    pub fn new(inner: L, failures: u32) -> Self {
        Self {
            inner,
            failures_left: Mutex::new(failures),
        }
    }
}

#[async_trait]
impl<L: LedgerClient> LedgerClient for FlakyLedger<L> {
    async fn get_balance(&self, user_id: UserId) -> LedgerResult<Amount> {
        self.inner.get_balance(user_id).await
    }

    async fn settle_session_charge(&self, charge: &SessionCharge) -> LedgerResult<Settlement> {
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(LedgerError::Unavailable("injected settlement failure".into()));
            }
        }
        self.inner.settle_session_charge(charge).await
    }

    async fn ping(&self) -> LedgerResult<()> {
        self.inner.ping().await
    }
}

/// One engine wired to a real wallet store, a real room hub, and fixed ids
pub struct Harness<L> {
    pub engine: Arc<BillingEngine<L>>,
    pub hub: Arc<RoomHub>,
    pub store: MemoryWalletStore,
    pub client: UserId,
    pub advisor: UserId,
}

/// Harness over the plain in-memory settlement ledger, 20% commission
pub fn billing_harness(opening_cents: i64) -> Harness<MemoryLedger> {
    let (store, client, advisor) = seeded_store(opening_cents);
    let ledger = settlement_over(&store);
    build_harness(ledger, store, client, advisor)
}

/// Harness whose first `failures` settlements fail with a transient error
pub fn flaky_harness(opening_cents: i64, failures: u32) -> Harness<FlakyLedger<MemoryLedger>> {
    let (store, client, advisor) = seeded_store(opening_cents);
    let ledger = FlakyLedger::new(settlement_over(&store), failures);
    build_harness(ledger, store, client, advisor)
}

fn seeded_store(opening_cents: i64) -> (MemoryWalletStore, UserId, UserId) {
    let store = MemoryWalletStore::new();
    let client = UserId::new();
    store.open_wallet(client, Amount::from_cents(opening_cents));
    (store, client, UserId::new())
}

fn settlement_over(store: &MemoryWalletStore) -> MemoryLedger {
    SettlementLedger::new(
        Arc::new(store.clone()),
        CommissionRate::from_basis_points(2000).unwrap(),
    )
}

fn build_harness<L: LedgerClient>(
    ledger: L,
    store: MemoryWalletStore,
    client: UserId,
    advisor: UserId,
) -> Harness<L> {
    let hub = Arc::new(RoomHub::new());
    let engine = Arc::new(BillingEngine::new(
        Arc::new(ledger),
        hub.clone() as Arc<dyn EventPublisher>,
        BillingConfig::new(),
    ));
    Harness {
        engine,
        hub,
        store,
        client,
        advisor,
    }
}
