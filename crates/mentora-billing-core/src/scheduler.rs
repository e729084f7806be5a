//! Periodic billing driver
//!
//! One interval loop that sweeps evictable sessions and then runs a billing
//! cycle for every active one. Cycles run as separate tasks so a slow
//! ledger call for one session never delays the others; the tick joins
//! them before returning so a tick's work is done when it resolves.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use mentora_ledger::LedgerClient;

use crate::engine::BillingEngine;

/// Periodic driver for the billing engine
pub struct BillingScheduler<L: ?Sized> {
    engine: Arc<BillingEngine<L>>,
    shutdown: CancellationToken,
}

impl<L: LedgerClient + ?Sized + 'static> BillingScheduler<L> {
    /// Create a scheduler that stops when the token is cancelled
    pub fn new(engine: Arc<BillingEngine<L>>, shutdown: CancellationToken) -> Self {
        Self { engine, shutdown }
    }

    /// Spawn the scheduler loop onto the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let period = self.engine.config().billing_interval;
        let mut ticker = tokio::time::interval(period);
        // a late tick must not cause a burst of catch-up ticks
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = period.as_secs(), "billing scheduler started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("billing scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(Utc::now()).await;
                }
            }
        }
    }

    /// Run one scheduler pass: evict, then cycle every active session
    pub(crate) async fn tick(&self, now: DateTime<Utc>) {
        let evicted = self.engine.evict_expired(now).await;
        if evicted > 0 {
            debug!(evicted, "evicted terminated sessions");
        }

        let entries = self.engine.registry().active_entries().await;
        gauge!("billing_active_sessions").set(entries.len() as f64);
        if entries.is_empty() {
            return;
        }
        debug!(sessions = entries.len(), "billing tick");

        let mut cycles = JoinSet::new();
        for entry in entries {
            let engine = Arc::clone(&self.engine);
            cycles.spawn(async move {
                let started = Instant::now();
                let outcome = engine.run_cycle(&entry, now).await;
                histogram!("billing_cycle_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                counter!("billing_cycles_total", "outcome" => outcome.label()).increment(1);
            });
        }
        while cycles.join_next().await.is_some() {}
    }
}

impl<L: ?Sized> std::fmt::Debug for BillingScheduler<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingScheduler").finish_non_exhaustive()
    }
}
