//! Error types for the adapter contract.

use thiserror::Error;

/// Errors raised by adapters.
///
/// A ledger rejecting an interaction is not an error: clients report that
/// through [`InteractionTimer::abort`](crate::InteractionTimer::abort).
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter does not implement an optional capability.
    #[error("Capability not supported: {0}")]
    Unsupported(&'static str),

    /// Adapter parameters or environment are invalid.
    #[error("Invalid adapter configuration: {0}")]
    Config(String),

    /// Communication with the ledger failed.
    #[error("Ledger transport failure: {0}")]
    Transport(String),

    /// A handle was not created by this adapter.
    #[error("Unknown handle: {0}")]
    UnknownHandle(String),

    /// Building or encoding an interaction failed.
    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Errors decoding an interaction payload on a secondary.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Unrecognized interaction kind: {0}")]
    UnknownKind(String),
}
