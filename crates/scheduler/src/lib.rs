//! Workload scheduler for secondaries.
//!
//! A secondary's shard is dealt round-robin across a fixed number of lanes
//! (entry `i` goes to lane `i mod lanes`), so every lane sees its portion in
//! schedule order. Lanes run as independent tasks that share only the
//! read-only shard and the adapter client.
//!
//! ```text
//! shard: [p0 p1 p2 p3 p4]      lanes = 2
//!
//!   lane 0: p0 ── p2 ── p4
//!   lane 1:   p1 ── p3
//! ```
//!
//! Max-delay and max-skew are advisory: exceeding them logs a warning but
//! never cuts the run short.

mod config;
mod lane;
mod scheduler;

#[cfg(test)]
mod testing;

pub use config::SchedulerConfig;
pub use lane::{lane_len, Lane, LaneError, LaneOutcome};
pub use scheduler::RunningScheduler;
