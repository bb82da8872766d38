//! Statistics reduction over a benchmark result.
//!
//! Scans every interaction in the result tree once:
//!
//! - `last_time` is the latest submit, commit or abort time seen.
//! - An interaction counts as submitted when its submit time is set.
//! - It yields a latency sample when it committed without aborting and the
//!   commit does not precede the submit.
//!
//! Rates and latencies are only reported when `last_time > 0` and at least
//! one latency sample exists; otherwise every figure is unavailable.

use crate::result::BenchmarkResult;
use crate::InteractionResult;
use hdrhistogram::Histogram;
use std::fmt;

/// Reduced figures for one benchmark run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statistics {
    /// Total number of interactions in the result tree.
    pub num_interactions: usize,

    /// Interactions with a submit time.
    pub num_submitted: usize,

    /// Interactions that committed.
    pub num_committed: usize,

    /// Interactions that aborted.
    pub num_aborted: usize,

    /// Latest time observed anywhere in the tree, in seconds.
    pub last_time: f64,

    /// Commit latencies in seconds, ascending.
    latencies: Vec<f64>,
}

impl Statistics {
    /// Reduce a full result tree.
    pub fn from_result(result: &BenchmarkResult) -> Self {
        Self::from_interactions(result.interactions())
    }

    /// Reduce any sequence of interaction results.
    pub fn from_interactions<'a>(
        interactions: impl IntoIterator<Item = &'a InteractionResult>,
    ) -> Self {
        let mut stats = Self::default();

        for interaction in interactions {
            stats.num_interactions += 1;
            if let Some(time) = interaction.last_time() {
                stats.last_time = stats.last_time.max(time);
            }
            if interaction.submit_time().is_some() {
                stats.num_submitted += 1;
            }
            if interaction.commit_time().is_some() {
                stats.num_committed += 1;
            }
            if interaction.abort_time().is_some() {
                stats.num_aborted += 1;
            }
            if let Some(latency) = interaction.latency() {
                stats.latencies.push(latency);
            }
        }

        stats.latencies.sort_by(f64::total_cmp);
        stats
    }

    /// Whether rate and latency figures can be computed.
    pub fn is_available(&self) -> bool {
        self.last_time > 0.0 && !self.latencies.is_empty()
    }

    /// Number of latency samples.
    pub fn num_samples(&self) -> usize {
        self.latencies.len()
    }

    /// Submitted interactions per second.
    pub fn average_load(&self) -> Option<f64> {
        self.is_available()
            .then(|| self.num_submitted as f64 / self.last_time)
    }

    /// Committed interactions per second.
    pub fn average_throughput(&self) -> Option<f64> {
        self.is_available()
            .then(|| self.latencies.len() as f64 / self.last_time)
    }

    /// Mean commit latency in seconds.
    pub fn average_latency(&self) -> Option<f64> {
        self.is_available()
            .then(|| self.latencies.iter().sum::<f64>() / self.latencies.len() as f64)
    }

    /// Median commit latency in seconds.
    ///
    /// Selects the element at index `n / 2` of the ascending samples, so for
    /// an even count this is the upper of the two middle samples.
    pub fn median_latency(&self) -> Option<f64> {
        self.is_available()
            .then(|| self.latencies[self.latencies.len() / 2])
    }

    /// Latency at the given quantile (0.0 to 1.0), with microsecond precision.
    pub fn latency_quantile(&self, quantile: f64) -> Option<f64> {
        if !self.is_available() {
            return None;
        }
        let mut histogram = Histogram::<u64>::new(3).ok()?;
        for latency in &self.latencies {
            // Auto-resizes to cover the largest sample.
            histogram.record((latency * 1_000_000.0) as u64).ok()?;
        }
        Some(histogram.value_at_quantile(quantile.clamp(0.0, 1.0)) as f64 / 1_000_000.0)
    }
}

fn figure(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.3} {}", v, unit),
        None => "unavailable".to_string(),
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Benchmark Report ===")?;
        writeln!(f, "Interactions:       {}", self.num_interactions)?;
        writeln!(f, "Submitted:          {}", self.num_submitted)?;
        writeln!(f, "Committed:          {}", self.num_committed)?;
        writeln!(f, "Aborted:            {}", self.num_aborted)?;
        writeln!(f, "Duration:           {:.3} s", self.last_time)?;
        writeln!(f, "Average load:       {}", figure(self.average_load(), "tx/s"))?;
        writeln!(
            f,
            "Average throughput: {}",
            figure(self.average_throughput(), "tx/s")
        )?;
        writeln!(f, "Average latency:    {}", figure(self.average_latency(), "s"))?;
        writeln!(f, "Median latency:     {}", figure(self.median_latency(), "s"))?;
        writeln!(
            f,
            "P90 latency:        {}",
            figure(self.latency_quantile(0.90), "s")
        )?;
        write!(
            f,
            "P99 latency:        {}",
            figure(self.latency_quantile(0.99), "s")
        )
    }
}
