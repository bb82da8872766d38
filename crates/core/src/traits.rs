//! The ledger adapter contract.
//!
//! Every ledger technology plugs in through three traits:
//!
//! - [`Adapter`]: a factory registered under a ledger type.
//! - [`Builder`]: used once by the primary to provision accounts and
//!   contracts and to encode interaction payloads.
//! - [`Client`]: used by each secondary at run time to decode and trigger
//!   interactions.
//!
//! The core never inspects payloads or handles; it only threads them through
//! these calls.

use crate::error::{AdapterError, DecodeError};
use crate::handle::{AccountHandle, ContractHandle, InteractionHandle, ResourceHandle};
use crate::params::{AdapterParams, ConnectionView, EndpointGroups, Environment};
use crate::timer::InteractionTimer;
use async_trait::async_trait;
use std::sync::Arc;

/// Optional builder capabilities an adapter may support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Supports [`Builder::create_resource`].
    pub resources: bool,

    /// Supports [`Builder::encode_interaction`].
    pub custom_interactions: bool,
}

/// Factory for builders and clients of one ledger technology.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Create the builder the primary uses during setup.
    async fn builder(
        &self,
        params: &AdapterParams,
        env: &Environment,
        endpoints: &EndpointGroups,
    ) -> Result<Box<dyn Builder>, AdapterError>;

    /// Create the client a secondary uses to run its shard.
    ///
    /// The client is shared by every lane of the secondary. Adapters whose
    /// connections are not safe to share should synchronize internally.
    async fn client(&self, view: &ConnectionView) -> Result<Arc<dyn Client>, AdapterError>;
}

/// Setup-time capability: provisions ledger state and encodes payloads.
#[async_trait]
pub trait Builder: Send {
    /// Which optional operations this builder supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Create an account funded with `stake`.
    async fn create_account(&mut self, stake: u64) -> Result<AccountHandle, AdapterError>;

    /// Deploy the named contract.
    async fn create_contract(&mut self, name: &str) -> Result<ContractHandle, AdapterError>;

    /// Create an adapter-specific resource in `domain`.
    async fn create_resource(&mut self, domain: &str) -> Result<ResourceHandle, AdapterError> {
        let _ = domain;
        Err(AdapterError::Unsupported("create_resource"))
    }

    /// Encode a transfer of `stake` from one account to another.
    async fn encode_transfer(
        &mut self,
        stake: u64,
        from: AccountHandle,
        to: AccountHandle,
    ) -> Result<Vec<u8>, AdapterError>;

    /// Encode a contract invocation signed by `from`.
    async fn encode_invoke(
        &mut self,
        from: AccountHandle,
        contract: ContractHandle,
    ) -> Result<Vec<u8>, AdapterError>;

    /// Encode an adapter-specific interaction of the given kind.
    async fn encode_interaction(&mut self, kind: &str) -> Result<Vec<u8>, AdapterError> {
        let _ = kind;
        Err(AdapterError::Unsupported("encode_interaction"))
    }
}

/// Run-time capability: decodes and triggers interactions.
#[async_trait]
pub trait Client: Send + Sync {
    /// Turn a payload produced by the matching builder into a handle.
    fn decode_payload(&self, bytes: &[u8]) -> Result<InteractionHandle, DecodeError>;

    /// Submit the interaction and wait for its outcome.
    ///
    /// Implementations must call `timer.submit()` when the interaction is
    /// sent and then exactly one of `timer.commit()` or `timer.abort()`
    /// before returning. A ledger-level rejection is an abort, not an error;
    /// return `Err` only for transport or protocol failures.
    async fn trigger_interaction(
        &self,
        interaction: InteractionHandle,
        timer: &mut InteractionTimer,
    ) -> Result<(), AdapterError>;
}
