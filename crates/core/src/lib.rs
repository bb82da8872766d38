//! Ledger adapter contract for ledgerbench.
//!
//! Defines what a ledger technology must provide to be benchmarked
//! ([`Adapter`], [`Builder`], [`Client`]), the opaque handles passed between
//! them, the per-interaction [`InteractionTimer`] callback, and the
//! [`AdapterRegistry`] both primary and secondary consult.

mod error;
mod handle;
mod params;
mod registry;
mod timer;
mod traits;

pub use error::{AdapterError, DecodeError};
pub use handle::{AccountHandle, ContractHandle, InteractionHandle, ResourceHandle};
pub use params::{AdapterParams, ConnectionView, EndpointGroups, Environment};
pub use registry::AdapterRegistry;
pub use timer::InteractionTimer;
pub use traits::{Adapter, Builder, Capabilities, Client};
