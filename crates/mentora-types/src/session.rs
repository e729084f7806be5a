//! Consultation session types

use serde::{Deserialize, Serialize};

/// Unique consultation session identifier
///
/// Session ids originate in the realtime layer (they double as room names),
/// so they are opaque strings rather than UUIDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a new session ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Billing state of a consultation session
///
/// A session leaves [`SessionState::Active`] exactly once and never returns;
/// the three terminal states record how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Metering in progress
    Active,
    /// Ended gracefully by a stop or session-ended command
    Completed,
    /// Ended by explicit cancellation
    Cancelled,
    /// Ended by the scheduler because the client balance could not cover a
    /// due charge
    InsufficientFunds,
}

impl SessionState {
    /// Whether the session is still being metered
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the session has reached a terminal state
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }
}
