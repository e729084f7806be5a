//! HTTP wallet store adapter
//!
//! Talks to the external wallet service over its REST API. Mutating calls
//! carry an idempotency key that stays constant across retries, so a retried
//! debit or credit cannot double-apply.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use mentora_types::{Amount, UserId};

use crate::error::{LedgerError, LedgerResult};
use crate::retry::{with_retry, RetryConfig};
use crate::store::{TransactionEntry, WalletStore};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Configuration for the HTTP wallet store
#[derive(Clone)]
pub struct WalletApiConfig {
    /// Base URL of the wallet service (e.g. `https://wallets.internal`)
    pub base_url: String,
    /// Bearer token for the wallet API
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry behavior for transient failures
    pub retry: RetryConfig,
}

impl WalletApiConfig {
    /// Create a configuration with default timeout and retry behavior
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry behavior.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for WalletApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Wallet store backed by the external wallet service
#[derive(Debug, Clone)]
pub struct HttpWalletStore {
    client: Client,
    config: WalletApiConfig,
}

impl HttpWalletStore {
    /// Create a new HTTP wallet store
    pub fn new(config: WalletApiConfig) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LedgerError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Make an authenticated request to the wallet API
    async fn api_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        idempotency_key: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> LedgerResult<T> {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.config.api_key);

        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "wallet api request failed");
            LedgerError::Unavailable(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "wallet api error");
            return Err(classify_status(status, error_body));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "failed to parse wallet api response");
            LedgerError::Protocol(e.to_string())
        })
    }
}

#[async_trait]
impl WalletStore for HttpWalletStore {
    #[instrument(skip(self))]
    async fn balance(&self, user_id: UserId) -> LedgerResult<Amount> {
        debug!(user_id = %user_id, "fetching wallet balance");

        let path = format!("/v1/wallets/{user_id}/balance");
        let response: BalanceResponse = with_retry(self.config.retry.clone(), || {
            self.api_request(Method::GET, &path, None, None)
        })
        .await?;

        Ok(Amount::from_cents(response.balance_cents))
    }

    #[instrument(skip(self))]
    async fn debit(&self, user_id: UserId, amount: Amount) -> LedgerResult<Amount> {
        debug!(user_id = %user_id, amount = %amount, "debiting wallet");

        let path = format!("/v1/wallets/{user_id}/debit");
        let key = Uuid::new_v4().to_string();
        let body = serde_json::json!({ "amountCents": amount.cents() });
        let response: BalanceResponse = with_retry(self.config.retry.clone(), || {
            self.api_request(Method::POST, &path, Some(&key), Some(body.clone()))
        })
        .await?;

        Ok(Amount::from_cents(response.balance_cents))
    }

    #[instrument(skip(self))]
    async fn credit(&self, user_id: UserId, amount: Amount) -> LedgerResult<Amount> {
        debug!(user_id = %user_id, amount = %amount, "crediting wallet");

        let path = format!("/v1/wallets/{user_id}/credit");
        let key = Uuid::new_v4().to_string();
        let body = serde_json::json!({ "amountCents": amount.cents() });
        let response: BalanceResponse = with_retry(self.config.retry.clone(), || {
            self.api_request(Method::POST, &path, Some(&key), Some(body.clone()))
        })
        .await?;

        Ok(Amount::from_cents(response.balance_cents))
    }

    #[instrument(skip(self, entry))]
    async fn record(&self, entry: TransactionEntry) -> LedgerResult<()> {
        debug!(session_id = %entry.session_id, "recording transaction entry");

        let body =
            serde_json::to_value(&entry).map_err(|e| LedgerError::Protocol(e.to_string()))?;
        let key = Uuid::new_v4().to_string();
        let _: RecordedResponse = with_retry(self.config.retry.clone(), || {
            self.api_request(Method::POST, "/v1/transactions", Some(&key), Some(body.clone()))
        })
        .await?;

        Ok(())
    }

    async fn ping(&self) -> LedgerResult<()> {
        let url = format!("{}/v1/health", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LedgerError::Unavailable(format!(
                "health endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Map a non-success wallet API status to a ledger error
fn classify_status(status: StatusCode, body: String) -> LedgerError {
    if status == StatusCode::NOT_FOUND {
        return LedgerError::NotFound;
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return LedgerError::Config(format!("wallet api refused credentials: {status}"));
    }
    if status.is_client_error() {
        let detail = if body.is_empty() {
            status.to_string()
        } else {
            body
        };
        return LedgerError::Rejected(detail);
    }
    if status.is_server_error() {
        return LedgerError::Unavailable(format!("wallet api error: {status}"));
    }
    LedgerError::Protocol(format!("unexpected wallet api status: {status}"))
}

// Wallet API response types

/// Balance payload returned by wallet endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    /// Balance in cents after the operation
    balance_cents: i64,
}

/// Acknowledgement for a recorded transaction entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordedResponse {
    /// Server-assigned entry id
    #[serde(default)]
    id: Option<String>,
}
