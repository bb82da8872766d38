//! Primary and secondary runners for ledgerbench.
//!
//! A benchmark involves one primary and any number of secondaries:
//!
//! 1. Secondaries dial the primary's control port.
//! 2. The primary provisions the ledger through the adapter's builder and
//!    plans one workload shard per secondary.
//! 3. Every secondary replays its shard against the ledger and records when
//!    each interaction was submitted and committed or aborted.
//! 4. The primary collects the timings into one result and emits it.

pub mod config;
pub mod output;
pub mod planner;
pub mod primary;
pub mod secondary;
pub mod telemetry;

pub use config::{
    BenchmarkConfig, BenchmarkDescriptor, ConfigError, FaultPolicy, SetupConfig, WorkloadKind,
    WorkloadSpec,
};
pub use output::{emit_result, encode_result, OutputError};
pub use planner::{plan, PlanError};
pub use primary::{Primary, PrimaryError, SecondaryError, SecondaryFailure};
pub use secondary::{Secondary, SecondaryConfig, ServeError};

use ledgerbench_core::AdapterRegistry;
use std::sync::Arc;

/// Default control port of the primary.
pub const DEFAULT_PORT: u16 = 7000;

/// Registry of every adapter built into this binary.
pub fn default_registry() -> AdapterRegistry {
    AdapterRegistry::new().with_adapter(
        ledgerbench_mock::LEDGER_TYPE,
        Arc::new(ledgerbench_mock::MockAdapter),
    )
}
