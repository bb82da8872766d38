//! Scheduler configuration.

use std::time::Duration;

/// Configuration for the lanes of one secondary.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of concurrent lanes.
    pub lanes: usize,

    /// Trigger round trips longer than this are logged. Advisory only.
    pub max_delay: Duration,

    /// Wake-ups further than this from schedule are logged. Advisory only.
    pub max_skew: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lanes: 1,
            max_delay: Duration::from_secs(5),
            max_skew: Duration::from_millis(100),
        }
    }
}

impl SchedulerConfig {
    /// Set the number of lanes (at least one).
    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes.max(1);
        self
    }

    /// Set the max-delay warning threshold.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the max-skew warning threshold.
    pub fn with_max_skew(mut self, max_skew: Duration) -> Self {
        self.max_skew = max_skew;
        self
    }
}
