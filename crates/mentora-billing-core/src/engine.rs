//! Session lifecycle controller and billing cycles
//!
//! [`BillingEngine`] owns the registry and drives every money-touching state
//! transition. All mutation of one session happens under that session's
//! entry lock, including the ledger awaits, so cycles, stops and cancels
//! for the same session serialize while distinct sessions proceed in
//! parallel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, error, info, instrument, warn};

use mentora_ledger::{LedgerClient, SessionCharge};
use mentora_types::{Amount, RoomEvent, SessionId, SessionState, UserId};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::events::EventPublisher;
use crate::registry::{SessionEntry, SessionRegistry};
use crate::session::{minutes_due, BillingSession, NewSession, BILLING_UNIT_SECS};

/// How a session termination was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    /// A participant asked to stop billing
    Stop,
    /// The upstream room lifecycle ended; the room is told so too
    Ended,
}

/// Result of a start request
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A new session was registered
    Started(BillingSession),
    /// A session with this id already existed; its current state is returned
    Existing(BillingSession),
}

impl StartOutcome {
    /// The session state the start request resolved to
    pub fn session(&self) -> &BillingSession {
        match self {
            StartOutcome::Started(s) | StartOutcome::Existing(s) => s,
        }
    }
}

/// Result of a stop or cancel request
#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// The session was finalized by this request
    Finalized(BillingSession),
    /// The session was already terminal; nothing changed
    AlreadyEnded,
    /// No session with this id is registered
    NotFound,
}

/// Result of one billing cycle for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Session already terminal, nothing evaluated
    Skipped,
    /// Less than a billable minute had accumulated; time was accrued
    Accrued {
        /// Seconds folded into the metered duration
        elapsed_secs: u64,
    },
    /// A charge settled and the session advanced
    Billed {
        /// Whole minutes charged
        minutes: u64,
        /// Amount charged
        charge: Amount,
        /// Client balance after the charge
        balance_after: Amount,
    },
    /// The client could not cover the charge; the session was terminated
    Terminated {
        /// Charge the cycle needed
        required: Amount,
        /// Balance the client had
        available: Amount,
    },
    /// A ledger failure; state was left untouched for retry next cycle
    Failed,
}

impl CycleOutcome {
    /// Stable label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Skipped => "skipped",
            CycleOutcome::Accrued { .. } => "accrued",
            CycleOutcome::Billed { .. } => "billed",
            CycleOutcome::Terminated { .. } => "terminated",
            CycleOutcome::Failed => "failed",
        }
    }
}

/// Real-time billing engine over a ledger client and an event publisher
pub struct BillingEngine<L: ?Sized> {
    registry: SessionRegistry,
    ledger: Arc<L>,
    events: Arc<dyn EventPublisher>,
    config: BillingConfig,
}

impl<L: ?Sized> BillingEngine<L> {
    /// Create an engine with an empty registry
    pub fn new(ledger: Arc<L>, events: Arc<dyn EventPublisher>, config: BillingConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            ledger,
            events,
            config,
        }
    }

    /// The engine's session registry
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The engine's configuration
    pub fn config(&self) -> &BillingConfig {
        &self.config
    }
}

impl<L: LedgerClient + ?Sized> BillingEngine<L> {
    /// Start a billing session, or return the existing one for its id
    ///
    /// New sessions are refused when the client's balance is below the
    /// configured minimum; the refusal is published to the room so the
    /// client learns why nothing started. A duplicate start never re-checks
    /// the balance and never re-publishes the initial update.
    #[instrument(skip(self, input), fields(session_id = %input.session_id))]
    pub async fn start_session(
        &self,
        input: NewSession,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome, BillingError> {
        let session = BillingSession::create(input, now)?;

        if let Some(entry) = self.registry.get(&session.session_id).await {
            debug!("start for already-registered session");
            return Ok(StartOutcome::Existing(entry.snapshot().await));
        }

        let balance = self.balance_or_zero(session.client_id).await?;
        if balance < self.config.min_start_balance {
            warn!(
                available = %balance,
                required = %self.config.min_start_balance,
                "refusing session start, balance below minimum"
            );
            self.events.publish(RoomEvent::InsufficientFunds {
                session_id: session.session_id.clone(),
            });
            counter!("billing_sessions_rejected_total").increment(1);
            return Err(BillingError::InsufficientFunds {
                required: self.config.min_start_balance,
                available: balance,
            });
        }

        let session_id = session.session_id.clone();
        let (entry, created) = self.registry.start_or_get(session).await;
        let snapshot = entry.snapshot().await;
        if !created {
            // lost a start race after the balance check
            return Ok(StartOutcome::Existing(snapshot));
        }

        // the wire contract fixes the initial update at literal zeros
        self.events.publish(RoomEvent::BillingUpdate {
            session_id,
            duration: 0,
            amount_billed: Amount::ZERO,
            current_balance: Amount::ZERO,
        });
        counter!("billing_sessions_started_total").increment(1);
        info!(rate = %snapshot.rate_per_minute, "billing session started");
        Ok(StartOutcome::Started(snapshot))
    }

    /// Run one billing cycle for one session
    ///
    /// Evaluates the time accumulated since the session was last charged.
    /// Below one minute the time is merely accrued; at or above it the
    /// whole-minute charge is settled through the ledger. Session fields
    /// only move after the ledger call resolves, so a failed settlement
    /// leaves the session exactly as it was for the next cycle.
    #[instrument(skip(self, entry), fields(session_id = %entry.session_id()))]
    pub async fn run_cycle(&self, entry: &SessionEntry, now: DateTime<Utc>) -> CycleOutcome {
        let mut session = entry.lock().await;
        if session.state.is_terminal() {
            return CycleOutcome::Skipped;
        }

        let unbilled = session.unbilled_secs(now);
        if unbilled < BILLING_UNIT_SECS {
            let elapsed_secs = session.accrue(now);
            debug!(elapsed_secs, "cycle accrued sub-minute span");
            return CycleOutcome::Accrued { elapsed_secs };
        }

        let minutes = minutes_due(unbilled);
        let charge = match session.charge_for_minutes(minutes) {
            Ok(charge) => charge,
            Err(e) => {
                error!(minutes, error = %e, "cycle charge not computable");
                return CycleOutcome::Failed;
            }
        };

        let balance = match self.balance_or_zero(session.client_id).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "balance check failed, retrying next cycle");
                return CycleOutcome::Failed;
            }
        };

        if balance < charge {
            session.terminate(SessionState::InsufficientFunds, now);
            entry.mark_inactive();
            let session_id = session.session_id.clone();
            drop(session);
            self.events
                .publish(RoomEvent::InsufficientFunds { session_id });
            counter!("billing_sessions_ended_total", "reason" => "insufficient_funds")
                .increment(1);
            info!(
                required = %charge,
                available = %balance,
                "session terminated, balance below charge"
            );
            return CycleOutcome::Terminated {
                required: charge,
                available: balance,
            };
        }

        let request = SessionCharge {
            session_id: session.session_id.clone(),
            client_id: session.client_id,
            advisor_id: session.advisor_id,
            amount: charge,
        };
        match self.ledger.settle_session_charge(&request).await {
            Ok(_) => {
                if let Err(e) = session.apply_charge(now, charge) {
                    error!(error = %e, "charge settled but session totals overflowed");
                    return CycleOutcome::Failed;
                }
                let balance_after = balance.checked_sub(charge).unwrap_or(Amount::ZERO);
                let update = RoomEvent::BillingUpdate {
                    session_id: session.session_id.clone(),
                    duration: session.duration_secs,
                    amount_billed: session.total_billed,
                    current_balance: balance_after,
                };
                drop(session);
                self.events.publish(update);
                counter!("billing_charged_cents_total").increment(charge.cents().max(0) as u64);
                debug!(minutes, charge = %charge, "cycle settled");
                CycleOutcome::Billed {
                    minutes,
                    charge,
                    balance_after,
                }
            }
            Err(e) => {
                warn!(error = %e, "settlement failed, session retained for retry");
                CycleOutcome::Failed
            }
        }
    }

    /// Stop a billing session
    ///
    /// Finalizes the metered duration by rounding the unbilled tail up to
    /// whole minutes and attempts one final charge for that tail. The charge
    /// is best-effort: any ledger failure still leaves the session completed
    /// with its duration finalized. With [`StopKind::Ended`] the room is
    /// additionally told that the session ended upstream.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn stop_session(
        &self,
        session_id: &SessionId,
        kind: StopKind,
        now: DateTime<Utc>,
    ) -> StopOutcome {
        self.finish_session(
            session_id,
            SessionState::Completed,
            kind == StopKind::Ended,
            true,
            now,
        )
        .await
    }

    /// Cancel a billing session by operator intervention
    ///
    /// The duration is finalized like a stop but no final charge is
    /// attempted; money movement ceases at the moment of cancellation.
    /// The room is told the session ended.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn cancel_session(&self, session_id: &SessionId, now: DateTime<Utc>) -> StopOutcome {
        self.finish_session(session_id, SessionState::Cancelled, true, false, now)
            .await
    }

    /// Evict terminated sessions past the grace window and close their rooms
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let evicted = self
            .registry
            .sweep_ended(now, self.config.eviction_grace)
            .await;
        for session_id in &evicted {
            self.events.close_room(session_id);
            debug!(%session_id, "evicted terminated session");
        }
        evicted.len()
    }

    async fn finish_session(
        &self,
        session_id: &SessionId,
        state: SessionState,
        announce_end: bool,
        charge_tail: bool,
        now: DateTime<Utc>,
    ) -> StopOutcome {
        let Some(entry) = self.registry.get(session_id).await else {
            debug!("termination for unknown session");
            return StopOutcome::NotFound;
        };

        let mut session = entry.lock().await;
        if session.state.is_terminal() {
            debug!("termination for already-ended session");
            return StopOutcome::AlreadyEnded;
        }

        let minutes = session.finalize_tail(now);
        if charge_tail && minutes > 0 {
            match session.charge_for_minutes(minutes) {
                Ok(charge) => {
                    let request = SessionCharge {
                        session_id: session.session_id.clone(),
                        client_id: session.client_id,
                        advisor_id: session.advisor_id,
                        amount: charge,
                    };
                    match self.ledger.settle_session_charge(&request).await {
                        Ok(_) => {
                            if let Err(e) = session.apply_charge(now, charge) {
                                error!(error = %e, "final charge settled but totals overflowed");
                            }
                        }
                        Err(e) => {
                            warn!(
                                minutes,
                                error = %e,
                                "final charge failed, duration finalized without it"
                            );
                        }
                    }
                }
                Err(e) => error!(minutes, error = %e, "final charge not computable"),
            }
        }

        session.terminate(state, now);
        entry.mark_inactive();
        let snapshot = session.clone();
        drop(session);

        if announce_end {
            self.events.publish(RoomEvent::SessionEnded {
                session_id: session_id.clone(),
            });
        }
        let reason = match state {
            SessionState::Cancelled => "cancelled",
            _ => "completed",
        };
        counter!("billing_sessions_ended_total", "reason" => reason).increment(1);
        info!(
            duration_secs = snapshot.duration_secs,
            total_billed = %snapshot.total_billed,
            ?state,
            "billing session finished"
        );
        StopOutcome::Finalized(snapshot)
    }

    async fn balance_or_zero(&self, client_id: UserId) -> Result<Amount, BillingError> {
        match self.ledger.get_balance(client_id).await {
            Ok(balance) => Ok(balance),
            Err(e) if e.is_not_found() => Ok(Amount::ZERO),
            Err(e) => Err(e.into()),
        }
    }
}

impl<L: ?Sized> std::fmt::Debug for BillingEngine<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
