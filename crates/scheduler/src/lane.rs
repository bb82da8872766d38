//! A single execution lane.
//!
//! A lane walks its portion of the shard in order. For each interaction it
//! sleeps until the scheduled time, decodes the payload, triggers it through
//! the client and stores the recorded timing in the slot for that
//! interaction. The first decode or trigger error stops the lane; slots it
//! never reached keep their sentinel times.

use crate::config::SchedulerConfig;
use ledgerbench_core::{AdapterError, Client, DecodeError, InteractionTimer};
use ledgerbench_types::{ClientResult, LaneId, ScheduledInteraction, WorkloadShard};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Errors that stop a lane.
#[derive(Debug, Error)]
pub enum LaneError {
    #[error("Interaction {slot} could not be decoded: {source}")]
    Decode {
        slot: usize,
        #[source]
        source: DecodeError,
    },

    #[error("Interaction {slot} failed in the adapter: {source}")]
    Adapter {
        slot: usize,
        #[source]
        source: AdapterError,
    },

    #[error("Lane task panicked or was cancelled: {0}")]
    Aborted(String),
}

/// Result of running one lane.
#[derive(Debug)]
pub struct LaneOutcome {
    /// Timing for every interaction assigned to the lane, in schedule order.
    pub result: ClientResult,

    /// The error that stopped the lane early, if any.
    pub error: Option<LaneError>,
}

/// Number of shard entries lane `lane` receives when `len` entries are
/// dealt round-robin across `lanes` lanes.
pub fn lane_len(len: usize, lanes: usize, lane: usize) -> usize {
    if lane >= lanes {
        return 0;
    }
    len / lanes + usize::from(lane < len % lanes)
}

/// One independent execution cursor over a strided view of the shard.
pub struct Lane {
    id: LaneId,
    lanes: usize,
    shard: Arc<WorkloadShard>,
    client: Arc<dyn Client>,
    max_delay: Duration,
    max_skew: Duration,
}

impl Lane {
    /// Create lane `id` of `config.lanes`, sharing the shard and client.
    pub fn new(
        id: LaneId,
        shard: Arc<WorkloadShard>,
        client: Arc<dyn Client>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            id,
            lanes: config.lanes.max(1),
            shard,
            client,
            max_delay: config.max_delay,
            max_skew: config.max_skew,
        }
    }

    /// Number of interactions this lane is responsible for.
    pub fn len(&self) -> usize {
        lane_len(self.shard.len(), self.lanes, self.id.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn portion(&self) -> impl Iterator<Item = &ScheduledInteraction> {
        self.shard.iter().skip(self.id.0).step_by(self.lanes)
    }

    /// Run the lane to completion. Scheduled times are relative to `origin`.
    pub async fn run(self, origin: Instant) -> LaneOutcome {
        let mut result = ClientResult::unreached(self.len());
        debug!(lane = %self.id, interactions = result.len(), "Lane started");

        for (slot, interaction) in self.portion().enumerate() {
            let target = origin + interaction.at;
            tokio::time::sleep_until(target).await;

            let skew = Instant::now().saturating_duration_since(target);
            if skew > self.max_skew {
                warn!(
                    lane = %self.id,
                    slot,
                    skew_ms = skew.as_millis() as u64,
                    "Interaction started late"
                );
            }

            let handle = match self.client.decode_payload(&interaction.payload) {
                Ok(handle) => handle,
                Err(source) => {
                    error!(lane = %self.id, slot, error = %source, "Failed to decode interaction");
                    return LaneOutcome {
                        result,
                        error: Some(LaneError::Decode { slot, source }),
                    };
                }
            };

            let mut timer = InteractionTimer::new(origin);
            let started = Instant::now();
            let outcome = self.client.trigger_interaction(handle, &mut timer).await;
            let elapsed = started.elapsed();

            if elapsed > self.max_delay {
                warn!(
                    lane = %self.id,
                    slot,
                    delay_ms = elapsed.as_millis() as u64,
                    "Interaction exceeded max delay"
                );
            }

            let recorded = timer.into_result();
            if outcome.is_ok() && !recorded.is_complete() {
                warn!(lane = %self.id, slot, "Client returned without a terminal outcome");
            }
            result.interactions[slot] = recorded;

            if let Err(source) = outcome {
                error!(lane = %self.id, slot, error = %source, "Adapter failure, stopping lane");
                return LaneOutcome {
                    result,
                    error: Some(LaneError::Adapter { slot, source }),
                };
            }
        }

        debug!(lane = %self.id, "Lane finished");
        LaneOutcome {
            result,
            error: None,
        }
    }
}
