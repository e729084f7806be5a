//! Mentora Billing Core - real-time metering for live consultation sessions
//!
//! The engine keeps one in-memory record per live session and charges the
//! client in whole-minute increments as wall time accumulates:
//!
//! - [`SessionRegistry`] holds the live sessions, one lock per session
//! - [`BillingEngine`] drives starts, billing cycles, stops and cancels
//! - [`BillingScheduler`] runs a cycle for every active session on a timer
//! - [`RoomHub`] fans billing events out to session rooms
//!
//! # Example
//!
//! ```rust,ignore
//! use mentora_billing_core::{BillingConfig, BillingEngine, BillingScheduler, RoomHub};
//!
//! let hub = Arc::new(RoomHub::new());
//! let engine = Arc::new(BillingEngine::new(ledger, hub.clone(), BillingConfig::new()));
//!
//! // Start metering a session
//! engine.start_session(new_session, Utc::now()).await?;
//!
//! // Drive cycles until shutdown
//! BillingScheduler::new(engine, shutdown_token).spawn();
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use config::BillingConfig;
pub use engine::{BillingEngine, CycleOutcome, StartOutcome, StopKind, StopOutcome};
pub use error::{BillingError, BillingResult};
pub use events::{EventPublisher, RoomHub};
pub use registry::{SessionEntry, SessionRegistry};
pub use scheduler::BillingScheduler;
pub use session::{minutes_due, BillingSession, NewSession, BILLING_UNIT_SECS};
