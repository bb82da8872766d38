//! Benchmark configuration.
//!
//! A run is described by two TOML files plus command-line options:
//!
//! - the **setup file** names the ledger type and how to reach the ledger;
//! - the **benchmark file** describes the accounts, contracts and workloads;
//! - the [`BenchmarkDescriptor`] ties them together with the run parameters.
//!
//! ```toml
//! # setup.toml
//! ledger = "mock"
//!
//! [parameters]
//! delay_ms = "5"
//!
//! [endpoints]
//! rpc = ["127.0.0.1:8545"]
//! ```
//!
//! ```toml
//! # benchmark.toml
//! contracts = ["counter"]
//!
//! [accounts]
//! count = 100
//! stake = 1000000
//!
//! [[workloads]]
//! kind = "transfer"
//! rate = 200.0
//! duration = "30s"
//!
//! [[workloads]]
//! kind = "invoke"
//! rate = 10.0
//! duration = "30s"
//! start = "5s"
//! ```

use ledgerbench_core::{AdapterParams, EndpointGroups, Environment};
use ledgerbench_types::LedgerType;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Where and what the ledger under test is.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetupConfig {
    /// Registry key of the adapter to use.
    pub ledger: LedgerType,

    /// Adapter parameters, passed through untouched.
    #[serde(default)]
    pub parameters: AdapterParams,

    /// Named groups of ledger endpoints.
    #[serde(default)]
    pub endpoints: EndpointGroups,
}

impl SetupConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        read_toml(path)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Accounts provisioned before the run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountsConfig {
    /// Number of accounts to create.
    pub count: usize,

    /// Initial stake of each account.
    #[serde(default = "default_account_stake")]
    pub stake: u64,
}

fn default_account_stake() -> u64 {
    1_000_000
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            count: 0,
            stake: default_account_stake(),
        }
    }
}

/// What each interaction of a workload does.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkloadKind {
    /// Transfer between two distinct random accounts.
    Transfer {
        #[serde(default = "default_transfer_stake")]
        stake: u64,
    },

    /// Invoke a contract from a random account, cycling through contracts.
    Invoke,

    /// Adapter-specific interaction, if the adapter supports it.
    Custom { name: String },
}

fn default_transfer_stake() -> u64 {
    1
}

/// A constant-rate stream of interactions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkloadSpec {
    #[serde(flatten)]
    pub kind: WorkloadKind,

    /// Interactions per second.
    pub rate: f64,

    /// How long the workload lasts.
    #[serde(deserialize_with = "humantime_duration")]
    pub duration: Duration,

    /// Offset from the start of the run.
    #[serde(default, deserialize_with = "humantime_duration")]
    pub start: Duration,
}

impl WorkloadSpec {
    /// Number of interactions this workload generates.
    pub fn count(&self) -> usize {
        (self.rate * self.duration.as_secs_f64()).floor() as usize
    }
}

/// Accounts, contracts and workloads of a run.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default)]
    pub accounts: AccountsConfig,

    /// Contracts to deploy, by name.
    #[serde(default)]
    pub contracts: Vec<String>,

    /// Adapter resources to create, by domain.
    #[serde(default)]
    pub resources: Vec<String>,

    #[serde(default)]
    pub workloads: Vec<WorkloadSpec>,
}

impl BenchmarkConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = read_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, workload) in self.workloads.iter().enumerate() {
            if !(workload.rate.is_finite() && workload.rate > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "workload {} has non-positive rate {}",
                    i, workload.rate
                )));
            }
            match workload.kind {
                WorkloadKind::Transfer { .. } if self.accounts.count < 2 => {
                    return Err(ConfigError::Invalid(format!(
                        "workload {} transfers but fewer than 2 accounts are configured",
                        i
                    )));
                }
                WorkloadKind::Invoke if self.accounts.count == 0 || self.contracts.is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "workload {} invokes but no accounts or contracts are configured",
                        i
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Total number of interactions across all workloads.
    pub fn total_interactions(&self) -> usize {
        self.workloads.iter().map(WorkloadSpec::count).sum()
    }
}

/// What to do when a phase reports failed secondaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FaultPolicy {
    /// Stop the run at the first failing phase.
    #[default]
    Abort,

    /// Drop failed secondaries and continue with the rest.
    Degrade,
}

/// Global parameters of a benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkDescriptor {
    /// Number of secondaries to wait for.
    pub secondaries: usize,

    /// Round trips longer than this are logged.
    pub max_delay: Duration,

    /// Wake-ups further than this from schedule are logged.
    pub max_skew: Duration,

    /// Master seed for workload generation.
    pub seed: u64,

    pub setup_path: PathBuf,
    pub benchmark_path: PathBuf,

    pub fault_policy: FaultPolicy,

    /// Environment strings handed to the adapter's builder.
    pub env: Environment,
}

impl BenchmarkDescriptor {
    /// Create a descriptor with default thresholds.
    pub fn new(secondaries: usize, setup_path: PathBuf, benchmark_path: PathBuf) -> Self {
        Self {
            secondaries,
            max_delay: Duration::from_secs(5),
            max_skew: Duration::from_millis(100),
            seed: 0,
            setup_path,
            benchmark_path,
            fault_policy: FaultPolicy::default(),
            env: Environment::default(),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_max_skew(mut self, max_skew: Duration) -> Self {
        self.max_skew = max_skew;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    /// Load the setup and benchmark files.
    pub fn load(&self) -> Result<(SetupConfig, BenchmarkConfig), ConfigError> {
        if self.secondaries == 0 {
            return Err(ConfigError::Invalid(
                "at least one secondary is required".to_string(),
            ));
        }
        Ok((
            SetupConfig::load(&self.setup_path)?,
            BenchmarkConfig::load(&self.benchmark_path)?,
        ))
    }
}
