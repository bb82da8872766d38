//! ledgerbench: distributed ledger benchmark orchestrator.

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use ledgerbench_core::Environment;
use ledgerbench_production::{
    default_registry, emit_result, telemetry, BenchmarkDescriptor, FaultPolicy, Primary,
    Secondary, SecondaryConfig, DEFAULT_PORT,
};
use ledgerbench_types::Statistics;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "ledgerbench")]
#[command(about = "Distributed benchmark orchestrator for ledger technologies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Coordinate a benchmark across secondaries and emit the result
    Primary {
        /// Number of secondaries to wait for
        secondaries: usize,

        /// Setup file (ledger type, parameters, endpoints)
        setup: PathBuf,

        /// Benchmark file (accounts, contracts, workloads)
        benchmark: PathBuf,

        /// Log interactions whose round trip exceeds this (e.g., "5s")
        #[arg(long, default_value = "5s")]
        max_delay: humantime::Duration,

        /// Log interactions that start later than this (e.g., "100ms")
        #[arg(long, default_value = "100ms")]
        max_skew: humantime::Duration,

        /// Master seed for workload generation
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Control port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// LZ4-compress the result
        #[arg(long)]
        compress: bool,

        /// What to do when secondaries fail a phase
        #[arg(long, value_enum, default_value_t = FaultPolicy::Abort)]
        fault_policy: FaultPolicy,

        /// Environment string for the adapter's builder (key=value, repeatable)
        #[arg(long)]
        env: Vec<String>,

        /// Increase log verbosity (-v, -vv, -vvv)
        #[arg(short, action = ArgAction::Count)]
        verbose: u8,
    },

    /// Run a shard of the workload on the primary's command
    Secondary {
        /// Host of the primary
        primary: String,

        /// Control port of the primary
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Environment string for the adapter (key=value, repeatable)
        #[arg(long)]
        env: Vec<String>,

        /// Tag for the adapter (repeatable)
        #[arg(long)]
        tag: Vec<String>,

        /// Number of concurrent lanes
        #[arg(long, default_value = "1")]
        lanes: usize,

        /// Increase log verbosity (-v, -vv, -vvv)
        #[arg(short, action = ArgAction::Count)]
        verbose: u8,
    },
}

impl Commands {
    fn verbosity(&self) -> u8 {
        match self {
            Self::Primary { verbose, .. } | Self::Secondary { verbose, .. } => *verbose,
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let registry = default_registry();

    match command {
        Commands::Primary {
            secondaries,
            setup,
            benchmark,
            max_delay,
            max_skew,
            seed,
            port,
            output,
            compress,
            fault_policy,
            env,
            verbose: _,
        } => {
            let descriptor = BenchmarkDescriptor::new(secondaries, setup, benchmark)
                .with_max_delay(max_delay.into())
                .with_max_skew(max_skew.into())
                .with_seed(seed)
                .with_fault_policy(fault_policy)
                .with_env(Environment::new(env));
            let (setup, benchmark) = descriptor.load().context("Invalid configuration")?;
            if !registry.contains(&setup.ledger) {
                bail!(
                    "Unknown ledger type {:?} (known: {})",
                    setup.ledger.as_str(),
                    registry
                        .ledger_types()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }

            let primary = Primary::listen(("0.0.0.0", port), secondaries)
                .await
                .with_context(|| format!("Failed to listen on port {}", port))?;
            let result = primary
                .run(&registry, &setup, &benchmark, &descriptor)
                .await
                .context("Benchmark failed")?;

            emit_result(&result, output.as_deref(), compress).context("Failed to emit result")?;
            eprintln!("{}", Statistics::from_result(&result));
        }

        Commands::Secondary {
            primary,
            port,
            env,
            tag,
            lanes,
            verbose: _,
        } => {
            let config = SecondaryConfig::new(primary, port)
                .with_env(Environment::new(env))
                .with_tags(tag)
                .with_lanes(lanes);
            info!(?config, "Starting secondary");
            Secondary::new(registry, config).run().await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // A second subscriber is the only failure mode and is harmless.
    let _ = telemetry::init_tracing(cli.command.verbosity());

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("Run `ledgerbench --help` for usage.");
            ExitCode::FAILURE
        }
    }
}
