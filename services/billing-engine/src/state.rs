//! Application state for the billing engine service.

use std::sync::Arc;

use mentora_billing_core::{BillingEngine, RoomHub};
use mentora_ledger::LedgerClient;

use crate::config::Config;

/// Engine type-erased over the configured ledger backend
pub type SharedEngine = Arc<BillingEngine<dyn LedgerClient>>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Billing engine (sessions, cycles, lifecycle)
    pub engine: SharedEngine,
    /// Room hub the realtime gateway subscribes through
    pub hub: Arc<RoomHub>,
    /// Ledger client (for readiness checks)
    pub ledger: Arc<dyn LedgerClient>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        engine: SharedEngine,
        hub: Arc<RoomHub>,
        ledger: Arc<dyn LedgerClient>,
        config: Config,
    ) -> Self {
        Self {
            engine,
            hub,
            ledger,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
