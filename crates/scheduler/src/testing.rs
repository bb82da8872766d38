//! Scripted client for scheduler tests.

use async_trait::async_trait;
use ledgerbench_core::{AdapterError, Client, DecodeError, InteractionHandle, InteractionTimer};
use ledgerbench_types::{ScheduledInteraction, WorkloadShard};
use parking_lot::Mutex;
use std::time::Duration;

/// What the scripted client does with an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Commit,
    SlowCommit,
    Abort,
    Fail,
}

impl Outcome {
    fn code(self) -> u8 {
        match self {
            Self::Commit => 0,
            Self::SlowCommit => 1,
            Self::Abort => 2,
            Self::Fail => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Commit),
            1 => Some(Self::SlowCommit),
            2 => Some(Self::Abort),
            3 => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Build a shard from `(millis, outcome)` pairs; payload `[outcome, index]`.
pub fn scripted(steps: &[(u64, Outcome)]) -> WorkloadShard {
    steps
        .iter()
        .enumerate()
        .map(|(i, (millis, outcome))| {
            ScheduledInteraction::new(
                Duration::from_millis(*millis),
                vec![outcome.code(), i as u8],
            )
        })
        .collect()
}

/// Client that follows the outcome encoded in each payload.
#[derive(Default)]
pub struct ScriptedClient {
    triggered: Mutex<Vec<u8>>,
}

impl ScriptedClient {
    /// Indices of triggered interactions, in trigger order.
    pub fn triggered(&self) -> Vec<u8> {
        self.triggered.lock().clone()
    }
}

#[async_trait]
impl Client for ScriptedClient {
    fn decode_payload(&self, bytes: &[u8]) -> Result<InteractionHandle, DecodeError> {
        match bytes {
            [code, index] => Outcome::from_code(*code)
                .map(|outcome| InteractionHandle::new((outcome, *index)))
                .ok_or_else(|| DecodeError::UnknownKind(code.to_string())),
            _ => Err(DecodeError::Malformed(format!("{} bytes", bytes.len()))),
        }
    }

    async fn trigger_interaction(
        &self,
        interaction: InteractionHandle,
        timer: &mut InteractionTimer,
    ) -> Result<(), AdapterError> {
        let (outcome, index) = interaction
            .downcast::<(Outcome, u8)>()
            .map_err(|_| AdapterError::UnknownHandle("not scripted".into()))?;
        self.triggered.lock().push(index);

        if outcome == Outcome::Fail {
            return Err(AdapterError::Transport("scripted failure".into()));
        }

        let _ = timer.submit();
        let delay = if outcome == Outcome::SlowCommit {
            Duration::from_millis(200)
        } else {
            Duration::from_millis(10)
        };
        tokio::time::sleep(delay).await;

        let _ = match outcome {
            Outcome::Abort => timer.abort(),
            _ => timer.commit(),
        };
        Ok(())
    }
}
