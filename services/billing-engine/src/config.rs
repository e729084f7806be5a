//! Configuration for the billing engine service.

use std::time::Duration;

use mentora_billing_core::BillingConfig;
use mentora_ledger::{RetryConfig, WalletApiConfig};
use mentora_types::{Amount, CommissionRate};

/// Which balance store the engine settles against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    /// In-process wallets, lost on restart
    Memory,
    /// External wallet API over HTTP
    Http,
}

/// Billing engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// How often the scheduler evaluates active sessions
    pub billing_interval: Duration,
    /// Minimum client balance required to start a session
    pub min_start_balance: Amount,
    /// How long terminated sessions stay resolvable
    pub eviction_grace: Duration,
    /// Platform commission withheld from advisor earnings
    pub commission: CommissionRate,
    /// Balance store backend
    pub ledger_backend: LedgerBackend,
    /// Wallet API base URL, required for the http backend
    pub wallet_api_url: Option<String>,
    /// Wallet API bearer token, required for the http backend
    pub wallet_api_key: Option<String>,
    /// Per-request wallet API timeout
    pub wallet_api_timeout: Duration,
    /// Opening balance for unknown wallets in the memory backend
    pub memory_opening_balance: Amount,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_port = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        let billing_interval_secs: u64 = std::env::var("BILLING_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("BILLING_INTERVAL_SECS"))?;
        if billing_interval_secs == 0 {
            return Err(ConfigError::Invalid("BILLING_INTERVAL_SECS"));
        }

        let min_start_balance_cents: i64 = std::env::var("MIN_START_BALANCE_CENTS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("MIN_START_BALANCE_CENTS"))?;

        let eviction_grace_secs: u64 = std::env::var("EVICTION_GRACE_SECS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("EVICTION_GRACE_SECS"))?;

        let commission_bps: u32 = std::env::var("COMMISSION_BPS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("COMMISSION_BPS"))?;
        let commission = CommissionRate::from_basis_points(commission_bps)
            .map_err(|_| ConfigError::Invalid("COMMISSION_BPS"))?;

        let ledger_backend =
            parse_backend(&std::env::var("LEDGER_BACKEND").unwrap_or_else(|_| "memory".to_string()))?;

        let wallet_api_url = std::env::var("WALLET_API_URL").ok();
        let wallet_api_key = std::env::var("WALLET_API_KEY").ok();
        if ledger_backend == LedgerBackend::Http {
            if wallet_api_url.is_none() {
                return Err(ConfigError::Missing("WALLET_API_URL"));
            }
            if wallet_api_key.is_none() {
                return Err(ConfigError::Missing("WALLET_API_KEY"));
            }
        }

        let wallet_api_timeout_secs: u64 = std::env::var("WALLET_API_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("WALLET_API_TIMEOUT_SECS"))?;

        let memory_opening_cents: i64 = std::env::var("MEMORY_WALLET_OPENING_CENTS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("MEMORY_WALLET_OPENING_CENTS"))?;

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        Ok(Self {
            http_port,
            billing_interval: Duration::from_secs(billing_interval_secs),
            min_start_balance: Amount::from_cents(min_start_balance_cents),
            eviction_grace: Duration::from_secs(eviction_grace_secs),
            commission,
            ledger_backend,
            wallet_api_url,
            wallet_api_key,
            wallet_api_timeout: Duration::from_secs(wallet_api_timeout_secs),
            memory_opening_balance: Amount::from_cents(memory_opening_cents),
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }

    /// Engine configuration derived from the environment
    pub fn billing(&self) -> BillingConfig {
        BillingConfig::new()
            .with_billing_interval(self.billing_interval)
            .with_min_start_balance(self.min_start_balance)
            .with_eviction_grace(self.eviction_grace)
    }

    /// Wallet API client configuration for the http backend
    pub fn wallet_api(&self) -> Result<WalletApiConfig, ConfigError> {
        let base_url = self
            .wallet_api_url
            .as_deref()
            .ok_or(ConfigError::Missing("WALLET_API_URL"))?;
        let api_key = self
            .wallet_api_key
            .as_deref()
            .ok_or(ConfigError::Missing("WALLET_API_KEY"))?;
        Ok(WalletApiConfig::new(base_url, api_key)
            .with_timeout(self.wallet_api_timeout)
            .with_retry(RetryConfig::default()))
    }
}

fn parse_backend(raw: &str) -> Result<LedgerBackend, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "memory" => Ok(LedgerBackend::Memory),
        "http" => Ok(LedgerBackend::Http),
        _ => Err(ConfigError::Invalid("LEDGER_BACKEND")),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> Config {
        Config {
            http_port: 8080,
            billing_interval: Duration::from_secs(60),
            min_start_balance: Amount::from_cents(100),
            eviction_grace: Duration::from_secs(300),
            commission: CommissionRate::from_basis_points(2000).unwrap(),
            ledger_backend: LedgerBackend::Memory,
            wallet_api_url: None,
            wallet_api_key: None,
            wallet_api_timeout: Duration::from_secs(10),
            memory_opening_balance: Amount::from_cents(10_000),
            request_timeout: Duration::from_secs(30),
            metrics_enabled: false,
        }
    }

    #[test]
    fn test_defaults_when_env_unset() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.billing_interval, Duration::from_secs(60));
        assert_eq!(config.min_start_balance, Amount::from_cents(100));
        assert_eq!(config.commission.basis_points(), 2000);
        assert_eq!(config.ledger_backend, LedgerBackend::Memory);
    }

    #[test]
    fn test_backend_parse_is_case_insensitive() {
        assert_eq!(parse_backend("memory").unwrap(), LedgerBackend::Memory);
        assert_eq!(parse_backend("HTTP").unwrap(), LedgerBackend::Http);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        match parse_backend("postgres") {
            Err(ConfigError::Invalid(var)) => assert_eq!(var, "LEDGER_BACKEND"),
            other => panic!("Expected invalid backend error, got: {other:?}"),
        }
    }

    #[test]
    fn test_wallet_api_requires_url_and_key() {
        let config = memory_config();
        match config.wallet_api() {
            Err(ConfigError::Missing(var)) => assert_eq!(var, "WALLET_API_URL"),
            other => panic!("Expected missing url error, got: {other:?}"),
        }

        let mut with_url = memory_config();
        with_url.wallet_api_url = Some("https://wallets.internal".to_string());
        match with_url.wallet_api() {
            Err(ConfigError::Missing(var)) => assert_eq!(var, "WALLET_API_KEY"),
            other => panic!("Expected missing key error, got: {other:?}"),
        }
    }

    #[test]
    fn test_wallet_api_carries_timeout() {
        let mut config = memory_config();
        config.wallet_api_url = Some("https://wallets.internal".to_string());
        config.wallet_api_key = Some("wk_test".to_string());
        config.wallet_api_timeout = Duration::from_secs(3);

        let api = config.wallet_api().unwrap();
        assert_eq!(api.base_url, "https://wallets.internal");
        assert_eq!(api.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_billing_carries_engine_settings() {
        let billing = memory_config().billing();
        assert_eq!(billing.billing_interval, Duration::from_secs(60));
        assert_eq!(billing.min_start_balance, Amount::from_cents(100));
        assert_eq!(billing.eviction_grace, Duration::from_secs(300));
    }
}
