//! Common test utilities for mentora-billing-core integration tests

pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{billing_harness, flaky_harness, t, FlakyLedger, Harness, MemoryLedger};
