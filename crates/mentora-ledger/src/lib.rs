//! Mentora Ledger - balance store contract and settlement
//!
//! The billing engine consumes a narrow ledger contract: read a balance,
//! settle one charge. [`SettlementLedger`] implements that contract over a
//! [`WalletStore`] that offers no multi-statement transactions, issuing an
//! explicit compensating reversal when a dual-wallet update partially fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use mentora_ledger::{LedgerClient, MemoryWalletStore, SettlementLedger};
//! use mentora_types::CommissionRate;
//!
//! let store = Arc::new(MemoryWalletStore::new());
//! let commission = CommissionRate::from_basis_points(2000)?;
//! let ledger = SettlementLedger::new(store, commission);
//!
//! // Read a client balance
//! let balance = ledger.get_balance(client_id).await?;
//!
//! // Settle one charge: debit client, credit advisor net of commission
//! let receipt = ledger.settle_session_charge(&charge).await?;
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod retry;
pub mod settlement;
pub mod store;

pub use client::{LedgerClient, SessionCharge, Settlement};
pub use error::{LedgerError, LedgerResult};
pub use http::{HttpWalletStore, WalletApiConfig};
pub use memory::MemoryWalletStore;
pub use retry::{with_retry, RetryConfig, RetryableError};
pub use settlement::SettlementLedger;
pub use store::{TransactionEntry, TransactionKind, WalletStore};
