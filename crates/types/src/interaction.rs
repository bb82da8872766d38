//! Scheduled interactions.
//!
//! An interaction is an opaque, adapter-encoded payload paired with the time
//! (relative to the start of the run) at which it should be submitted.
//!
//! # Encoding
//!
//! ```text
//! [u64 LE: scheduled time in microseconds][payload bytes ...]
//! ```

use std::time::Duration;
use thiserror::Error;

/// Size of the scheduled-time prefix.
const TIME_PREFIX_LEN: usize = 8;

/// Errors decoding a scheduled interaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractionFormatError {
    #[error("Interaction too short: {0} bytes")]
    TooShort(usize),
}

/// One scheduled transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledInteraction {
    /// Target start time relative to the run start.
    pub at: Duration,

    /// Adapter-encoded payload. Opaque to the core.
    pub payload: Vec<u8>,
}

impl ScheduledInteraction {
    /// Create a new scheduled interaction.
    pub fn new(at: Duration, payload: Vec<u8>) -> Self {
        Self { at, payload }
    }

    /// Encode to the shard wire format.
    pub fn encode(&self) -> Vec<u8> {
        let micros = u64::try_from(self.at.as_micros()).unwrap_or(u64::MAX);
        let mut bytes = Vec::with_capacity(TIME_PREFIX_LEN + self.payload.len());
        bytes.extend_from_slice(&micros.to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decode from the shard wire format.
    pub fn decode(bytes: &[u8]) -> Result<Self, InteractionFormatError> {
        if bytes.len() < TIME_PREFIX_LEN {
            return Err(InteractionFormatError::TooShort(bytes.len()));
        }
        let (prefix, payload) = bytes.split_at(TIME_PREFIX_LEN);
        let mut micros = [0u8; TIME_PREFIX_LEN];
        micros.copy_from_slice(prefix);

        Ok(Self {
            at: Duration::from_micros(u64::from_le_bytes(micros)),
            payload: payload.to_vec(),
        })
    }
}

/// The ordered interactions assigned to one secondary.
pub type WorkloadShard = Vec<ScheduledInteraction>;
