//! Run-time side of the mock ledger.

use crate::transaction::MockTransaction;
use async_trait::async_trait;
use ledgerbench_core::{AdapterError, Client, DecodeError, InteractionHandle, InteractionTimer};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

/// Default confirmation delay.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(10);

/// Default starting balance of every account.
pub const DEFAULT_BALANCE: u64 = 1_000_000;

/// An in-memory ledger that confirms after a fixed delay.
///
/// Every client keeps its own balances: accounts start at the configured
/// balance the first time they are touched. Transfers exceeding the sender's
/// balance are aborted.
pub struct MockClient {
    balances: Mutex<HashMap<u64, u64>>,
    initial_balance: u64,
    delay: Duration,

    /// 1-based trigger count at which to fail with a transport error.
    fail_at: Option<u64>,
    triggers: AtomicU64,
}

impl MockClient {
    pub fn new(delay: Duration, initial_balance: u64) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            initial_balance,
            delay,
            fail_at: None,
            triggers: AtomicU64::new(0),
        }
    }

    /// Fail the `n`-th trigger (1-based) with a transport error.
    pub fn with_fail_at(mut self, n: Option<u64>) -> Self {
        self.fail_at = n;
        self
    }

    /// Current balance of an account.
    pub fn balance(&self, account: u64) -> u64 {
        self.balances
            .lock()
            .get(&account)
            .copied()
            .unwrap_or(self.initial_balance)
    }

    /// Apply a transaction, returning whether the ledger accepted it.
    fn apply(&self, tx: &MockTransaction) -> bool {
        match tx {
            MockTransaction::Transfer { from, to, stake } => {
                let mut balances = self.balances.lock();
                let sender = *balances.entry(*from).or_insert(self.initial_balance);
                if sender < *stake {
                    return false;
                }
                balances.insert(*from, sender - stake);
                let receiver = balances.entry(*to).or_insert(self.initial_balance);
                *receiver = receiver.saturating_add(*stake);
                true
            }
            MockTransaction::Invoke { .. } | MockTransaction::Custom { .. } => true,
        }
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY, DEFAULT_BALANCE)
    }
}

#[async_trait]
impl Client for MockClient {
    fn decode_payload(&self, bytes: &[u8]) -> Result<InteractionHandle, DecodeError> {
        MockTransaction::decode(bytes).map(InteractionHandle::new)
    }

    async fn trigger_interaction(
        &self,
        interaction: InteractionHandle,
        timer: &mut InteractionTimer,
    ) -> Result<(), AdapterError> {
        let tx = interaction
            .downcast::<MockTransaction>()
            .map_err(|_| AdapterError::UnknownHandle("not a mock transaction".to_string()))?;

        let count = self.triggers.fetch_add(1, Ordering::Relaxed) + 1;
        if self.fail_at == Some(count) {
            return Err(AdapterError::Transport(format!(
                "injected failure at trigger {}",
                count
            )));
        }

        // Timing violations are logged by the timer itself.
        let _ = timer.submit();
        tokio::time::sleep(self.delay).await;

        let accepted = self.apply(&tx);
        trace!(?tx, accepted, "Mock transaction decided");
        let _ = if accepted {
            timer.commit()
        } else {
            timer.abort()
        };
        Ok(())
    }
}
