//! Documents carried by the `Workload` and `Results` commands.
//!
//! Workload document layout:
//!
//! ```text
//! [0]    ledger type (UTF-8)
//! [1]    run parameters (JSON)
//! [2..]  scheduled interactions, in schedule order
//! ```
//!
//! Results document layout:
//!
//! ```text
//! [0]    secondary result (JSON)
//! ```

use crate::codec::{CodecError, Document};
use ledgerbench_core::{AdapterParams, EndpointGroups};
use ledgerbench_types::{LedgerType, ScheduledInteraction, SecondaryResult, WorkloadShard};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings the primary hands to every secondary alongside its shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Endpoints of the ledger under test.
    pub endpoints: EndpointGroups,

    /// Adapter parameters from the setup file.
    pub parameters: AdapterParams,

    /// Round trips longer than this are logged.
    pub max_delay: Duration,

    /// Wake-ups further than this from schedule are logged.
    pub max_skew: Duration,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            endpoints: EndpointGroups::default(),
            parameters: AdapterParams::default(),
            max_delay: Duration::from_secs(5),
            max_skew: Duration::from_millis(100),
        }
    }
}

/// Everything a secondary needs to run its part of the benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadMessage {
    pub ledger_type: LedgerType,
    pub parameters: RunParameters,
    pub shard: WorkloadShard,
}

impl WorkloadMessage {
    pub fn to_document(&self) -> Result<Document, CodecError> {
        let parameters = serde_json::to_vec(&self.parameters)
            .map_err(|e| CodecError::JsonEncode(e.to_string()))?;

        let mut elements = Vec::with_capacity(2 + self.shard.len());
        elements.push(self.ledger_type.as_str().as_bytes().to_vec());
        elements.push(parameters);
        elements.extend(self.shard.iter().map(ScheduledInteraction::encode));
        Ok(Document::new(elements))
    }

    pub fn from_document(document: Document) -> Result<Self, CodecError> {
        document.require(2)?;
        let ledger_type = LedgerType::new(document.text(0)?);

        let mut elements = document.into_elements().into_iter().skip(1);
        let parameters = elements.next().unwrap_or_default();
        let parameters: RunParameters = serde_json::from_slice(&parameters)
            .map_err(|e| CodecError::JsonDecode(e.to_string()))?;

        let shard = elements
            .enumerate()
            .map(|(i, bytes)| {
                ScheduledInteraction::decode(&bytes).map_err(|e| CodecError::InvalidElement {
                    index: i + 2,
                    reason: e.to_string(),
                })
            })
            .collect::<Result<WorkloadShard, _>>()?;

        Ok(Self {
            ledger_type,
            parameters,
            shard,
        })
    }
}

/// Encode a secondary's results for the `Results` reply.
pub fn results_to_document(result: &SecondaryResult) -> Result<Document, CodecError> {
    let json = serde_json::to_vec(result).map_err(|e| CodecError::JsonEncode(e.to_string()))?;
    Ok(Document::new(vec![json]))
}

/// Decode a secondary's results from the `Results` reply.
pub fn results_from_document(document: &Document) -> Result<SecondaryResult, CodecError> {
    document.require(1)?;
    serde_json::from_slice(&document.elements()[0]).map_err(|e| CodecError::JsonDecode(e.to_string()))
}
