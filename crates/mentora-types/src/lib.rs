//! Mentora Types - Shared domain types
//!
//! This crate contains domain types used across Mentora services:
//! - Participant identity
//! - Consultation session identifiers and states
//! - Money amounts and commission rates
//! - Room-scoped billing commands and events

pub mod event;
pub mod money;
pub mod session;
pub mod user;

pub use event::*;
pub use money::*;
pub use session::*;
pub use user::*;
