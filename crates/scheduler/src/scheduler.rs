//! Runs every lane of a secondary concurrently.

use crate::config::SchedulerConfig;
use crate::lane::{Lane, LaneError, LaneOutcome};
use ledgerbench_core::Client;
use ledgerbench_types::{ClientResult, LaneId, SecondaryResult, WorkloadShard};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

/// A scheduler whose lanes have been spawned.
///
/// Dropping this does not stop the lanes; call [`join`](Self::join) to wait
/// for them and collect results.
pub struct RunningScheduler {
    lanes: Vec<(usize, JoinHandle<LaneOutcome>)>,
}

impl RunningScheduler {
    /// Spawn one task per configured lane, all sharing `origin` as zero time.
    pub fn spawn(
        shard: Arc<WorkloadShard>,
        client: Arc<dyn Client>,
        config: &SchedulerConfig,
        origin: Instant,
    ) -> Self {
        let lanes = (0..config.lanes.max(1))
            .map(|id| {
                let lane = Lane::new(LaneId(id), shard.clone(), client.clone(), config);
                let len = lane.len();
                (len, tokio::spawn(lane.run(origin)))
            })
            .collect::<Vec<_>>();

        info!(
            lanes = lanes.len(),
            interactions = shard.len(),
            "Scheduler started"
        );
        Self { lanes }
    }

    /// Wait for every lane to finish and assemble the secondary's result.
    ///
    /// Returns the result together with the errors that stopped lanes early.
    pub async fn join(self) -> (SecondaryResult, Vec<(LaneId, LaneError)>) {
        let mut clients = Vec::with_capacity(self.lanes.len());
        let mut errors = Vec::new();

        for (id, (len, handle)) in self.lanes.into_iter().enumerate() {
            let lane = LaneId(id);
            match handle.await {
                Ok(outcome) => {
                    if let Some(error) = outcome.error {
                        errors.push((lane, error));
                    }
                    clients.push(outcome.result);
                }
                Err(join_error) => {
                    warn!(%lane, error = %join_error, "Lane task did not complete");
                    clients.push(ClientResult::unreached(len));
                    errors.push((lane, LaneError::Aborted(join_error.to_string())));
                }
            }
        }

        info!(
            lanes = clients.len(),
            failed_lanes = errors.len(),
            "Scheduler drained"
        );
        (SecondaryResult::new(clients), errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scripted, Outcome, ScriptedClient};
    use tracing_test::traced_test;

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_one_result_per_lane() {
        let shard = Arc::new(scripted(&[
            (0, Outcome::Commit),
            (0, Outcome::Commit),
            (5, Outcome::Abort),
            (5, Outcome::Commit),
            (9, Outcome::Commit),
        ]));
        let config = SchedulerConfig::default().with_lanes(3);
        let client = Arc::new(ScriptedClient::default());

        let running = RunningScheduler::spawn(shard, client.clone(), &config, Instant::now());
        let (result, errors) = running.join().await;

        assert!(errors.is_empty());
        assert_eq!(result.clients.len(), 3);
        assert_eq!(
            result.clients.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert!(result.interactions().all(|r| r.is_complete()));

        let mut triggered = client.triggered();
        triggered.sort_unstable();
        assert_eq!(triggered, vec![0, 1, 2, 3, 4]);
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_failed_lane_does_not_affect_others() {
        let shard = Arc::new(scripted(&[
            (0, Outcome::Fail),
            (0, Outcome::Commit),
            (10, Outcome::Commit),
            (10, Outcome::Commit),
        ]));
        let config = SchedulerConfig::default().with_lanes(2);
        let client = Arc::new(ScriptedClient::default());

        let (result, errors) = RunningScheduler::spawn(shard, client, &config, Instant::now())
            .join()
            .await;

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, LaneId(0));
        assert!(result.clients[0].interactions.iter().all(|r| r.is_unreached()));
        assert!(result.clients[1].interactions.iter().all(|r| r.is_complete()));
    }

    #[traced_test]
    #[tokio::test(start_paused = true)]
    async fn test_empty_shard() {
        let config = SchedulerConfig::default().with_lanes(2);
        let client = Arc::new(ScriptedClient::default());

        let (result, errors) =
            RunningScheduler::spawn(Arc::new(Vec::new()), client, &config, Instant::now())
                .join()
                .await;

        assert!(errors.is_empty());
        assert_eq!(result.clients.len(), 2);
        assert!(result.clients.iter().all(|c| c.is_empty()));
    }
}
