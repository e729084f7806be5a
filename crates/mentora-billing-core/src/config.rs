//! Billing engine configuration

use std::time::Duration;

use mentora_types::Amount;

/// Billing engine configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// How often the scheduler evaluates active sessions
    pub billing_interval: Duration,
    /// Minimum client balance required to start a session
    pub min_start_balance: Amount,
    /// How long terminated sessions stay in the registry so that late
    /// duplicate termination signals resolve as no-ops
    pub eviction_grace: Duration,
}

impl BillingConfig {
    /// Create a config with production defaults
    pub fn new() -> Self {
        Self {
            billing_interval: Duration::from_secs(60),
            min_start_balance: Amount::from_cents(100),
            eviction_grace: Duration::from_secs(300),
        }
    }

    /// Set the scheduler tick interval
    pub fn with_billing_interval(mut self, interval: Duration) -> Self {
        self.billing_interval = interval;
        self
    }

    /// Set the minimum balance required to start a session
    pub fn with_min_start_balance(mut self, balance: Amount) -> Self {
        self.min_start_balance = balance;
        self
    }

    /// Set the retention window for terminated sessions
    pub fn with_eviction_grace(mut self, grace: Duration) -> Self {
        self.eviction_grace = grace;
        self
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self::new()
    }
}
