//! Hierarchical timing records.
//!
//! ```text
//! BenchmarkResult
//!   └── SecondaryResult   (one per secondary, in arrival order)
//!         └── ClientResult (one per lane)
//!               └── InteractionResult (one per scheduled interaction)
//! ```
//!
//! Times are seconds since the secondary started running. On the wire an
//! unset time is the sentinel `-1`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire value of an unset time.
pub const SENTINEL: f64 = -1.0;

/// Violations of the submit-then-terminal timing protocol.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimingViolation {
    #[error("Submit time recorded twice")]
    DuplicateSubmit,

    #[error("Terminal outcome recorded before submit")]
    TerminalBeforeSubmit,

    #[error("Terminal outcome recorded twice")]
    DuplicateTerminal,

    #[error("Both commit and abort times are set")]
    CommitAndAbort,

    #[error("Commit time {commit} precedes submit time {submit}")]
    CommitBeforeSubmit { submit: f64, commit: f64 },

    #[error("Negative time {0}")]
    NegativeTime(f64),
}

/// Timing of one executed or unreached interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawInteractionResult", into = "RawInteractionResult")]
pub struct InteractionResult {
    submit: Option<f64>,
    commit: Option<f64>,
    abort: Option<f64>,
}

impl InteractionResult {
    /// An interaction that was never attempted.
    pub fn unreached() -> Self {
        Self::default()
    }

    /// Build a result from explicit times, checking every invariant.
    pub fn from_times(
        submit: Option<f64>,
        commit: Option<f64>,
        abort: Option<f64>,
    ) -> Result<Self, TimingViolation> {
        for time in [submit, commit, abort].into_iter().flatten() {
            if time < 0.0 || time.is_nan() {
                return Err(TimingViolation::NegativeTime(time));
            }
        }
        if commit.is_some() && abort.is_some() {
            return Err(TimingViolation::CommitAndAbort);
        }
        if submit.is_none() && (commit.is_some() || abort.is_some()) {
            return Err(TimingViolation::TerminalBeforeSubmit);
        }
        if let (Some(submit), Some(commit)) = (submit, commit) {
            if submit > commit {
                return Err(TimingViolation::CommitBeforeSubmit { submit, commit });
            }
        }
        Ok(Self {
            submit,
            commit,
            abort,
        })
    }

    /// Record the submission instant.
    pub fn record_submit(&mut self, at: f64) -> Result<(), TimingViolation> {
        if self.submit.is_some() {
            return Err(TimingViolation::DuplicateSubmit);
        }
        self.submit = Some(at);
        Ok(())
    }

    /// Record a successful commit.
    pub fn record_commit(&mut self, at: f64) -> Result<(), TimingViolation> {
        let submit = self.check_terminal()?;
        // Commit never precedes submit.
        self.commit = Some(at.max(submit));
        Ok(())
    }

    /// Record a ledger-level rejection.
    pub fn record_abort(&mut self, at: f64) -> Result<(), TimingViolation> {
        let submit = self.check_terminal()?;
        self.abort = Some(at.max(submit));
        Ok(())
    }

    fn check_terminal(&self) -> Result<f64, TimingViolation> {
        if self.commit.is_some() || self.abort.is_some() {
            return Err(TimingViolation::DuplicateTerminal);
        }
        self.submit.ok_or(TimingViolation::TerminalBeforeSubmit)
    }

    pub fn submit_time(&self) -> Option<f64> {
        self.submit
    }

    pub fn commit_time(&self) -> Option<f64> {
        self.commit
    }

    pub fn abort_time(&self) -> Option<f64> {
        self.abort
    }

    /// Whether submit and a terminal outcome have both been recorded.
    pub fn is_complete(&self) -> bool {
        self.submit.is_some() && (self.commit.is_some() || self.abort.is_some())
    }

    /// Whether every time is still the sentinel.
    pub fn is_unreached(&self) -> bool {
        self.submit.is_none() && self.commit.is_none() && self.abort.is_none()
    }

    /// Commit latency in seconds, if this interaction committed.
    pub fn latency(&self) -> Option<f64> {
        match (self.submit, self.commit, self.abort) {
            (Some(submit), Some(commit), None) if commit >= submit => Some(commit - submit),
            _ => None,
        }
    }

    /// Latest recorded time, if any.
    pub fn last_time(&self) -> Option<f64> {
        [self.submit, self.commit, self.abort]
            .into_iter()
            .flatten()
            .reduce(f64::max)
    }
}

/// Wire shape of [`InteractionResult`], with sentinels instead of options.
#[derive(Serialize, Deserialize)]
struct RawInteractionResult {
    submit_time: f64,
    commit_time: f64,
    abort_time: f64,
}

fn from_wire(time: f64) -> Option<f64> {
    if time == SENTINEL {
        None
    } else {
        Some(time)
    }
}

impl TryFrom<RawInteractionResult> for InteractionResult {
    type Error = TimingViolation;

    fn try_from(raw: RawInteractionResult) -> Result<Self, Self::Error> {
        Self::from_times(
            from_wire(raw.submit_time),
            from_wire(raw.commit_time),
            from_wire(raw.abort_time),
        )
    }
}

impl From<InteractionResult> for RawInteractionResult {
    fn from(result: InteractionResult) -> Self {
        Self {
            submit_time: result.submit.unwrap_or(SENTINEL),
            commit_time: result.commit.unwrap_or(SENTINEL),
            abort_time: result.abort.unwrap_or(SENTINEL),
        }
    }
}

/// Timing sequence of one execution lane, in schedule order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientResult {
    pub interactions: Vec<InteractionResult>,
}

impl ClientResult {
    /// A lane result pre-filled with `len` unreached entries.
    pub fn unreached(len: usize) -> Self {
        Self {
            interactions: vec![InteractionResult::unreached(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}

/// Timing of one secondary, one entry per lane.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecondaryResult {
    pub clients: Vec<ClientResult>,
}

impl SecondaryResult {
    pub fn new(clients: Vec<ClientResult>) -> Self {
        Self { clients }
    }

    /// Iterate every interaction across all lanes.
    pub fn interactions(&self) -> impl Iterator<Item = &InteractionResult> {
        self.clients.iter().flat_map(|c| c.interactions.iter())
    }
}

/// Global benchmark outcome, ordered by secondary arrival.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub secondaries: Vec<SecondaryResult>,
}

impl BenchmarkResult {
    pub fn new(secondaries: Vec<SecondaryResult>) -> Self {
        Self { secondaries }
    }

    /// Iterate every interaction across the whole tree.
    pub fn interactions(&self) -> impl Iterator<Item = &InteractionResult> {
        self.secondaries.iter().flat_map(|s| s.interactions())
    }
}
