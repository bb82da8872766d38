//! Control protocol between the primary and its secondaries.
//!
//! A benchmark proceeds through fixed phases on every connection:
//!
//! ```text
//! Connected → Prepared → WorkloadReceived → Running → ResultsCollected → Closed
//!      Prepare      Workload          Run         Results            Fin
//! ```
//!
//! Each command is a single byte. Every command except `Fin` is answered by
//! exactly one `Ok` or `Err` byte before the next command may be sent.
//! Variable-length data travels as length-delimited [`Document`]s.

pub mod codec;
pub mod command;
pub mod wire;
pub mod workload;

pub use codec::{CodecError, Document};
pub use command::{Command, Reply};
pub use wire::{ControlStream, ProtocolError};
pub use workload::{results_from_document, results_to_document, RunParameters, WorkloadMessage};
