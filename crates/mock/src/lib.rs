//! Mock ledger adapter.
//!
//! An in-memory stand-in for a real ledger, registered under the `mock`
//! ledger type. Useful for smoke-testing a deployment of primary and
//! secondaries without a ledger under test.
//!
//! # Parameters
//!
//! | Source | Key | Meaning |
//! |---|---|---|
//! | setup `[parameters]` | `delay_ms` | confirmation delay (default 10) |
//! | setup `[parameters]` | `balance` | starting balance of every account (default 1 000 000) |
//! | secondary `--env` | `fail_at` | fail the n-th trigger with a transport error |
//!
//! The benchmark file's account `stake` does not reach the mock ledger; every
//! account starts at `balance`.

mod builder;
mod client;
mod transaction;

pub use builder::MockBuilder;
pub use client::{MockClient, DEFAULT_BALANCE, DEFAULT_DELAY};
pub use transaction::MockTransaction;

use async_trait::async_trait;
use ledgerbench_core::{
    Adapter, AdapterError, AdapterParams, Builder, Client, ConnectionView, EndpointGroups,
    Environment,
};
use std::sync::Arc;
use std::time::Duration;

/// Registry key of the mock adapter.
pub const LEDGER_TYPE: &str = "mock";

/// Factory for mock builders and clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockAdapter;

fn config_error(key: &str, err: impl std::fmt::Display) -> AdapterError {
    AdapterError::Config(format!("{}: {}", key, err))
}

#[async_trait]
impl Adapter for MockAdapter {
    async fn builder(
        &self,
        _params: &AdapterParams,
        _env: &Environment,
        _endpoints: &EndpointGroups,
    ) -> Result<Box<dyn Builder>, AdapterError> {
        Ok(Box::new(MockBuilder::new()))
    }

    async fn client(&self, view: &ConnectionView) -> Result<Arc<dyn Client>, AdapterError> {
        let delay = view
            .parameters
            .parse::<u64>("delay_ms")
            .map_err(|e| config_error("delay_ms", e))?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DELAY);
        let balance = view
            .parameters
            .parse::<u64>("balance")
            .map_err(|e| config_error("balance", e))?
            .unwrap_or(DEFAULT_BALANCE);
        let fail_at = view
            .env
            .get("fail_at")
            .map(str::parse::<u64>)
            .transpose()
            .map_err(|e| config_error("fail_at", e))?;

        Ok(Arc::new(
            MockClient::new(delay, balance).with_fail_at(fail_at),
        ))
    }
}
