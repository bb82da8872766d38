//! Workload planning on the primary.
//!
//! Provisions accounts and contracts through the adapter's [`Builder`], turns
//! each configured workload into a constant-rate stream of scheduled
//! interactions, merges the streams by time and deals the result round-robin
//! across secondaries. The same master seed always yields the same shards.

use crate::config::{BenchmarkConfig, WorkloadKind, WorkloadSpec};
use ledgerbench_core::{AccountHandle, AdapterError, Builder, ContractHandle};
use ledgerbench_types::{ScheduledInteraction, WorkloadShard};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors while planning a benchmark.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Workload {workload} needs at least {needed} accounts, have {available}")]
    NotEnoughAccounts {
        workload: usize,
        needed: usize,
        available: usize,
    },

    #[error("Workload {0} invokes contracts but none are configured")]
    NoContracts(usize),

    #[error("Adapter does not support {0}")]
    Unsupported(&'static str),

    #[error("No secondaries to plan for")]
    NoSecondaries,

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),
}

/// Ledger state created during provisioning.
#[derive(Debug, Default)]
struct Provisioned {
    accounts: Vec<AccountHandle>,
    contracts: Vec<ContractHandle>,
}

async fn provision(
    builder: &mut dyn Builder,
    config: &BenchmarkConfig,
) -> Result<Provisioned, PlanError> {
    let capabilities = builder.capabilities();
    if !config.resources.is_empty() && !capabilities.resources {
        return Err(PlanError::Unsupported("resources"));
    }

    let mut provisioned = Provisioned::default();
    for _ in 0..config.accounts.count {
        let account = builder.create_account(config.accounts.stake).await?;
        provisioned.accounts.push(account);
    }
    for name in &config.contracts {
        provisioned.contracts.push(builder.create_contract(name).await?);
    }
    for domain in &config.resources {
        builder.create_resource(domain).await?;
    }

    info!(
        accounts = provisioned.accounts.len(),
        contracts = provisioned.contracts.len(),
        resources = config.resources.len(),
        "Ledger provisioned"
    );
    Ok(provisioned)
}

/// Pick two distinct accounts.
fn pick_pair<R: Rng + ?Sized>(
    accounts: &[AccountHandle],
    rng: &mut R,
) -> (AccountHandle, AccountHandle) {
    let from = rng.gen_range(0..accounts.len());
    // Draw from the remaining n-1 and skip over `from`.
    let mut to = rng.gen_range(0..accounts.len() - 1);
    if to >= from {
        to += 1;
    }
    (accounts[from], accounts[to])
}

async fn generate(
    builder: &mut dyn Builder,
    index: usize,
    workload: &WorkloadSpec,
    provisioned: &Provisioned,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<ScheduledInteraction>, PlanError> {
    match &workload.kind {
        WorkloadKind::Transfer { .. } if provisioned.accounts.len() < 2 => {
            return Err(PlanError::NotEnoughAccounts {
                workload: index,
                needed: 2,
                available: provisioned.accounts.len(),
            });
        }
        WorkloadKind::Invoke if provisioned.accounts.is_empty() => {
            return Err(PlanError::NotEnoughAccounts {
                workload: index,
                needed: 1,
                available: 0,
            });
        }
        WorkloadKind::Invoke if provisioned.contracts.is_empty() => {
            return Err(PlanError::NoContracts(index));
        }
        WorkloadKind::Custom { .. } if !builder.capabilities().custom_interactions => {
            return Err(PlanError::Unsupported("custom interactions"));
        }
        _ => {}
    }

    let count = workload.count();
    let mut interactions = Vec::with_capacity(count);
    for i in 0..count {
        let at = workload.start + Duration::from_secs_f64(i as f64 / workload.rate);
        let payload = match &workload.kind {
            WorkloadKind::Transfer { stake } => {
                let (from, to) = pick_pair(&provisioned.accounts, rng);
                builder.encode_transfer(*stake, from, to).await?
            }
            WorkloadKind::Invoke => {
                let from = provisioned.accounts[rng.gen_range(0..provisioned.accounts.len())];
                let contract = provisioned.contracts[i % provisioned.contracts.len()];
                builder.encode_invoke(from, contract).await?
            }
            WorkloadKind::Custom { name } => builder.encode_interaction(name).await?,
        };
        interactions.push(ScheduledInteraction::new(at, payload));
    }

    debug!(
        workload = index,
        interactions = interactions.len(),
        rate = workload.rate,
        "Workload generated"
    );
    Ok(interactions)
}

/// Deal a time-ordered schedule round-robin across `secondaries` shards.
pub fn partition(schedule: Vec<ScheduledInteraction>, secondaries: usize) -> Vec<WorkloadShard> {
    let secondaries = secondaries.max(1);
    let mut shards = vec![WorkloadShard::new(); secondaries];
    for (i, interaction) in schedule.into_iter().enumerate() {
        shards[i % secondaries].push(interaction);
    }
    shards
}

/// Provision the ledger and produce one shard per secondary.
pub async fn plan(
    builder: &mut dyn Builder,
    config: &BenchmarkConfig,
    secondaries: usize,
    seed: u64,
) -> Result<Vec<WorkloadShard>, PlanError> {
    if secondaries == 0 {
        return Err(PlanError::NoSecondaries);
    }

    let provisioned = provision(builder, config).await?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut schedule = Vec::with_capacity(config.total_interactions());
    for (index, workload) in config.workloads.iter().enumerate() {
        schedule.extend(generate(builder, index, workload, &provisioned, &mut rng).await?);
    }
    // Stable: ties keep workload order.
    schedule.sort_by_key(|interaction| interaction.at);

    let shards = partition(schedule, secondaries);
    info!(
        secondaries,
        interactions = shards.iter().map(Vec::len).sum::<usize>(),
        seed,
        "Workload planned"
    );
    Ok(shards)
}
