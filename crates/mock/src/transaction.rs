//! Mock ledger transaction payloads.

use ledgerbench_core::{AdapterError, DecodeError};
use serde::{Deserialize, Serialize};

/// A transaction understood by the mock ledger. Encoded as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MockTransaction {
    /// Move `stake` from one account to another.
    Transfer { from: u64, to: u64, stake: u64 },

    /// Call a deployed contract.
    Invoke { from: u64, contract: u64 },

    /// Touch a resource created with `create_resource`.
    Custom { name: String },
}

impl MockTransaction {
    pub fn encode(&self) -> Result<Vec<u8>, AdapterError> {
        serde_json::to_vec(self).map_err(|e| AdapterError::Encode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Malformed("empty payload".to_string()));
        }
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}
