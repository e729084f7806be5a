//! Room-scoped billing commands and events
//!
//! Wire shapes for the realtime channel: `type`-tagged JSON with camelCase
//! payload fields. Monetary fields cross the wire as integer cents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Amount, SessionId, UserId};

/// Inbound lifecycle command from a session participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SessionCommand {
    /// Subscribe the sender to a session's room
    JoinRoom {
        /// Session whose room to join
        session_id: SessionId,
    },
    /// Begin metering a session
    BillingStart {
        /// Session to meter
        session_id: SessionId,
        /// Advisor being consulted
        advisor_id: UserId,
        /// Client being billed
        client_id: UserId,
        /// Advisor's per-minute rate in cents, fixed for the session
        rate_per_minute: Amount,
        /// Backdates metering to the realtime connect instant when provided
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_time: Option<DateTime<Utc>>,
    },
    /// Stop metering gracefully
    BillingStop {
        /// Session to stop
        session_id: SessionId,
    },
    /// Stop metering and notify the rest of the room
    SessionEnded {
        /// Session that ended
        session_id: SessionId,
    },
}

impl SessionCommand {
    /// The session this command addresses
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::JoinRoom { session_id }
            | Self::BillingStart { session_id, .. }
            | Self::BillingStop { session_id }
            | Self::SessionEnded { session_id } => session_id,
        }
    }
}

/// Outbound billing event broadcast to a session's room
///
/// Delivery is at-most-once and best-effort; billing correctness never
/// depends on an event reaching a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RoomEvent {
    /// Periodic metering update, also sent once with zeroed fields at
    /// session start
    BillingUpdate {
        /// Session being metered
        session_id: SessionId,
        /// Metered duration in seconds
        duration: u64,
        /// Total charged so far
        amount_billed: Amount,
        /// Client balance after the most recent charge
        current_balance: Amount,
    },
    /// The session was terminated because the client balance could not cover
    /// a due charge
    InsufficientFunds {
        /// Session that was terminated
        session_id: SessionId,
    },
    /// The session ended; re-broadcast so all room participants learn of it
    SessionEnded {
        /// Session that ended
        session_id: SessionId,
    },
}

impl RoomEvent {
    /// The session (and therefore room) this event belongs to
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::BillingUpdate { session_id, .. }
            | Self::InsufficientFunds { session_id }
            | Self::SessionEnded { session_id } => session_id,
        }
    }
}
