//! Billing session state and whole-minute cycle math

use chrono::{DateTime, Utc};
use serde::Serialize;

use mentora_types::{Amount, SessionId, SessionState, UserId};

use crate::error::BillingError;

/// Length of one billable unit in seconds
pub const BILLING_UNIT_SECS: u64 = 60;

/// Whole billable minutes covering an unbilled span, rounding up
pub fn minutes_due(unbilled_secs: u64) -> u64 {
    unbilled_secs.div_ceil(BILLING_UNIT_SECS)
}

/// Parameters for starting a billing session
#[derive(Debug, Clone)]
pub struct NewSession {
    /// Identifier of the consultation room
    pub session_id: SessionId,
    /// Client paying for the session
    pub client_id: UserId,
    /// Advisor earning from the session
    pub advisor_id: UserId,
    /// Per-minute rate in cents, fixed for the session lifetime
    pub rate_per_minute: Amount,
    /// Session start, defaults to the current time when absent
    pub started_at: Option<DateTime<Utc>>,
}

/// Metering state for one consultation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSession {
    /// Identifier of the consultation room
    pub session_id: SessionId,
    /// Client paying for the session
    pub client_id: UserId,
    /// Advisor earning from the session
    pub advisor_id: UserId,
    /// Per-minute rate in cents, fixed at session start
    pub rate_per_minute: Amount,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// Current lifecycle state
    pub state: SessionState,
    /// Metered duration in seconds, never decreases
    pub duration_secs: u64,
    /// Total amount charged so far, never decreases
    pub total_billed: Amount,
    /// When the most recent billing cycle evaluated this session,
    /// whether or not it charged
    pub last_billing_at: DateTime<Utc>,
    /// Instant up to which time has been charged. Trails `last_billing_at`
    /// across no-charge cycles so sub-minute remainders accumulate until
    /// a full minute is owed.
    pub billed_through: DateTime<Utc>,
    /// When the session reached a terminal state
    pub ended_at: Option<DateTime<Utc>>,
}

impl BillingSession {
    /// Create an active session from start parameters
    ///
    /// Callers normally go through [`BillingEngine::start_session`], which
    /// also checks the client's opening balance.
    ///
    /// [`BillingEngine::start_session`]: crate::engine::BillingEngine::start_session
    pub fn create(input: NewSession, now: DateTime<Utc>) -> Result<Self, BillingError> {
        if input.rate_per_minute.is_negative() {
            return Err(BillingError::InvalidRate(input.rate_per_minute));
        }
        let started_at = input.started_at.unwrap_or(now);
        Ok(Self {
            session_id: input.session_id,
            client_id: input.client_id,
            advisor_id: input.advisor_id,
            rate_per_minute: input.rate_per_minute,
            started_at,
            state: SessionState::Active,
            duration_secs: 0,
            total_billed: Amount::ZERO,
            last_billing_at: started_at,
            billed_through: started_at,
            ended_at: None,
        })
    }

    /// Seconds since the last cycle evaluation, clamped at zero
    pub fn secs_since_last_eval(&self, now: DateTime<Utc>) -> u64 {
        secs_between(self.last_billing_at, now)
    }

    /// Seconds of metered time not yet charged, clamped at zero
    pub fn unbilled_secs(&self, now: DateTime<Utc>) -> u64 {
        secs_between(self.billed_through, now)
    }

    /// Charge for a number of whole minutes at this session's rate
    pub fn charge_for_minutes(&self, minutes: u64) -> Result<Amount, BillingError> {
        let minutes = i64::try_from(minutes).map_err(|_| BillingError::AmountOverflow)?;
        self.rate_per_minute
            .checked_mul(minutes)
            .ok_or(BillingError::AmountOverflow)
    }

    /// Record a no-charge evaluation: fold the elapsed span into the metered
    /// duration and advance the evaluation timestamp. Returns the seconds
    /// added. A `now` at or before the last evaluation leaves the session
    /// untouched, so overlapping cycles cannot move timestamps backwards.
    pub(crate) fn accrue(&mut self, now: DateTime<Utc>) -> u64 {
        let elapsed = self.secs_since_last_eval(now);
        if elapsed == 0 {
            return 0;
        }
        self.duration_secs = self.duration_secs.saturating_add(elapsed);
        self.last_billing_at = now;
        elapsed
    }

    /// Record a settled charge: fold the elapsed span into the metered
    /// duration, add the charge, and advance both billing timestamps in
    /// one step. On overflow the session is left untouched.
    pub(crate) fn apply_charge(
        &mut self,
        now: DateTime<Utc>,
        charge: Amount,
    ) -> Result<(), BillingError> {
        let total = self
            .total_billed
            .checked_add(charge)
            .ok_or(BillingError::AmountOverflow)?;
        let elapsed = self.secs_since_last_eval(now);
        self.duration_secs = self.duration_secs.saturating_add(elapsed);
        self.total_billed = total;
        self.last_billing_at = now;
        self.billed_through = now;
        Ok(())
    }

    /// Finalize the metered duration at stop time: absorb the un-evaluated
    /// tail, then pad the unbilled remainder up to whole minutes. Returns
    /// the minutes still owed for the tail, charged best-effort by the
    /// caller. Does not touch `total_billed` or `billed_through`.
    pub(crate) fn finalize_tail(&mut self, now: DateTime<Utc>) -> u64 {
        self.accrue(now);
        let unbilled = self.unbilled_secs(now);
        if unbilled == 0 {
            return 0;
        }
        let minutes = minutes_due(unbilled);
        let padding = minutes * BILLING_UNIT_SECS - unbilled;
        self.duration_secs = self.duration_secs.saturating_add(padding);
        minutes
    }

    /// Move the session into a terminal state
    ///
    /// Callers check `state.is_terminal()` first; repeated termination is
    /// a no-op at the engine level.
    pub(crate) fn terminate(&mut self, state: SessionState, now: DateTime<Utc>) {
        debug_assert!(state.is_terminal());
        self.state = state;
        self.ended_at = Some(now);
    }
}

fn secs_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}
