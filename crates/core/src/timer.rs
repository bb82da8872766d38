//! Per-interaction timing callback.

use ledgerbench_types::{InteractionResult, TimingViolation};
use tokio::time::Instant;
use tracing::warn;

/// Single-use timing capability handed to a client for one interaction.
///
/// The client calls [`submit`](Self::submit) at the submission instant and
/// then exactly one of [`commit`](Self::commit) or [`abort`](Self::abort) once
/// the ledger has decided. Out-of-order or repeated calls are rejected and
/// leave the recorded times untouched.
#[derive(Debug)]
pub struct InteractionTimer {
    /// Zero time of the run, shared by every lane of a secondary.
    origin: Instant,
    result: InteractionResult,
    violations: u32,
}

impl InteractionTimer {
    /// Create a timer measuring relative to `origin`.
    pub fn new(origin: Instant) -> Self {
        Self {
            origin,
            result: InteractionResult::unreached(),
            violations: 0,
        }
    }

    fn now(&self) -> f64 {
        Instant::now()
            .saturating_duration_since(self.origin)
            .as_secs_f64()
    }

    fn check(&mut self, outcome: Result<(), TimingViolation>) -> Result<(), TimingViolation> {
        if let Err(violation) = outcome {
            self.violations += 1;
            warn!(%violation, "Adapter broke the timing protocol");
        }
        outcome
    }

    /// Record the submission instant.
    pub fn submit(&mut self) -> Result<(), TimingViolation> {
        let now = self.now();
        let outcome = self.result.record_submit(now);
        self.check(outcome)
    }

    /// Record that the ledger committed the interaction.
    pub fn commit(&mut self) -> Result<(), TimingViolation> {
        let now = self.now();
        let outcome = self.result.record_commit(now);
        self.check(outcome)
    }

    /// Record that the ledger rejected the interaction.
    pub fn abort(&mut self) -> Result<(), TimingViolation> {
        let now = self.now();
        let outcome = self.result.record_abort(now);
        self.check(outcome)
    }

    /// Number of rejected callback calls.
    pub fn violations(&self) -> u32 {
        self.violations
    }

    /// Consume the timer, yielding the recorded times.
    pub fn into_result(self) -> InteractionResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_times_are_relative_to_origin() {
        let origin = Instant::now();
        tokio::time::advance(Duration::from_secs(2)).await;

        let mut timer = InteractionTimer::new(origin);
        timer.submit().unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        timer.commit().unwrap();

        let result = timer.into_result();
        assert_eq!(result.submit_time(), Some(2.0));
        assert_eq!(result.commit_time(), Some(2.5));
        assert_eq!(result.latency(), Some(0.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_terminal_is_rejected() {
        let mut timer = InteractionTimer::new(Instant::now());
        timer.submit().unwrap();
        timer.abort().unwrap();

        assert_eq!(timer.commit(), Err(TimingViolation::DuplicateTerminal));
        assert_eq!(timer.violations(), 1);

        let result = timer.into_result();
        assert!(result.abort_time().is_some());
        assert!(result.commit_time().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_without_submit_is_rejected() {
        let mut timer = InteractionTimer::new(Instant::now());
        assert_eq!(timer.commit(), Err(TimingViolation::TerminalBeforeSubmit));
        assert!(timer.into_result().is_unreached());
    }
}
