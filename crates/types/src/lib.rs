//! Core types for ledgerbench.
//!
//! Identifiers, scheduled interactions, the hierarchical timing result tree
//! and the statistics reducer. Everything here is plain data; no I/O.

mod identifiers;
mod interaction;
mod result;
mod stats;

pub use identifiers::{LaneId, LedgerType, SecondaryId};
pub use interaction::{InteractionFormatError, ScheduledInteraction, WorkloadShard};
pub use result::{
    BenchmarkResult, ClientResult, InteractionResult, SecondaryResult, TimingViolation, SENTINEL,
};
pub use stats::Statistics;
