//! Primary and secondaries talking over localhost TCP with the mock ledger.

use ledgerbench_core::{AdapterParams, AdapterRegistry, Environment};
use ledgerbench_mock::MockTransaction;
use ledgerbench_production::{
    default_registry, BenchmarkConfig, BenchmarkDescriptor, FaultPolicy, Primary, PrimaryError,
    Secondary, SecondaryConfig, SetupConfig,
};
use ledgerbench_protocol::{Command, RunParameters};
use ledgerbench_types::{
    InteractionResult, LedgerType, ScheduledInteraction, SecondaryResult, Statistics,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_test::traced_test;

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn spawn_secondary(
    registry: AdapterRegistry,
    port: u16,
    env: &[&str],
) -> JoinHandle<Result<(), ledgerbench_production::ServeError>> {
    let env = Environment::new(env.iter().map(|s| s.to_string()).collect());
    let config = SecondaryConfig::new("127.0.0.1", port).with_env(env);
    tokio::spawn(Secondary::new(registry, config).run())
}

fn transfers(count: usize) -> Vec<ScheduledInteraction> {
    (0..count)
        .map(|i| {
            let payload = MockTransaction::Transfer {
                from: 0,
                to: 1,
                stake: 1,
            }
            .encode()
            .unwrap();
            ScheduledInteraction::new(Duration::from_millis(10 * i as u64), payload)
        })
        .collect()
}

fn pattern(result: &SecondaryResult) -> Vec<bool> {
    result
        .interactions()
        .map(InteractionResult::is_complete)
        .collect()
}

#[traced_test]
#[tokio::test]
async fn test_adapter_failure_mid_lane() {
    let (listener, port) = bind().await;
    let a = spawn_secondary(default_registry(), port, &["fail_at=2"]);
    let b = spawn_secondary(default_registry(), port, &[]);

    let primary = Primary::accept(listener, 2).await.unwrap();
    let parameters = RunParameters {
        parameters: AdapterParams::new().with("delay_ms", "1"),
        ..Default::default()
    };

    assert!(primary.prepare().await.is_empty());
    let errors = primary
        .distribute_workload(
            &LedgerType::new("mock"),
            &parameters,
            vec![transfers(3), transfers(3)],
        )
        .await
        .unwrap();
    assert!(errors.is_empty());
    assert!(primary.run_benchmark().await.is_empty());

    let (result, errors) = primary.collect_results().await;
    assert!(errors.is_empty());
    primary.finish().await;
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // Arrival order is not fixed, so identify the failing secondary by shape.
    let mut patterns: Vec<Vec<bool>> = result.secondaries.iter().map(pattern).collect();
    patterns.sort();
    assert_eq!(patterns, vec![vec![true, false, false], vec![true, true, true]]);

    let failed = result
        .secondaries
        .iter()
        .find(|s| pattern(s) == vec![true, false, false])
        .unwrap();
    assert!(failed
        .interactions()
        .skip(1)
        .all(|r| r.submit_time().is_none()
            && r.commit_time().is_none()
            && r.abort_time().is_none()));

    let stats = Statistics::from_result(&result);
    assert_eq!(stats.num_interactions, 6);
    assert_eq!(stats.num_submitted, 4);
    assert_eq!(stats.num_committed, 4);
}

struct Files {
    _dir: tempfile::TempDir,
    setup: PathBuf,
    benchmark: PathBuf,
}

fn write_files() -> Files {
    let dir = tempfile::tempdir().unwrap();
    let setup = dir.path().join("setup.toml");
    let benchmark = dir.path().join("benchmark.toml");
    std::fs::write(
        &setup,
        r#"
        ledger = "mock"

        [parameters]
        delay_ms = "2"
        "#,
    )
    .unwrap();
    std::fs::write(
        &benchmark,
        r#"
        [accounts]
        count = 4
        stake = 100

        [[workloads]]
        kind = "transfer"
        rate = 20.0
        duration = "500ms"
        "#,
    )
    .unwrap();
    Files {
        _dir: dir,
        setup,
        benchmark,
    }
}

fn load(
    files: &Files,
    policy: FaultPolicy,
) -> (BenchmarkDescriptor, SetupConfig, BenchmarkConfig) {
    let descriptor = BenchmarkDescriptor::new(2, files.setup.clone(), files.benchmark.clone())
        .with_seed(11)
        .with_fault_policy(policy);
    let (setup, benchmark) = descriptor.load().unwrap();
    (descriptor, setup, benchmark)
}

#[traced_test]
#[tokio::test]
async fn test_planned_run() {
    let files = write_files();
    let (descriptor, setup, benchmark) = load(&files, FaultPolicy::Abort);

    let (listener, port) = bind().await;
    let secondaries = [
        spawn_secondary(default_registry(), port, &[]),
        spawn_secondary(default_registry(), port, &[]),
    ];

    let primary = Primary::accept(listener, 2).await.unwrap();
    let result = primary
        .run(&default_registry(), &setup, &benchmark, &descriptor)
        .await
        .unwrap();
    for secondary in secondaries {
        secondary.await.unwrap().unwrap();
    }

    assert_eq!(result.secondaries.len(), 2);
    assert_eq!(
        result
            .secondaries
            .iter()
            .map(|s| s.interactions().count())
            .collect::<Vec<_>>(),
        vec![5, 5]
    );
    assert!(result.interactions().all(InteractionResult::is_complete));
    assert!(Statistics::from_result(&result).is_available());
}

#[traced_test]
#[tokio::test]
async fn test_abort_policy_stops_on_error_reply() {
    let files = write_files();
    let (descriptor, setup, benchmark) = load(&files, FaultPolicy::Abort);

    let (listener, port) = bind().await;
    let good = spawn_secondary(default_registry(), port, &[]);
    // Knows no ledger types, so it rejects the workload.
    let bad = spawn_secondary(AdapterRegistry::new(), port, &[]);

    let primary = Primary::accept(listener, 2).await.unwrap();
    let outcome = primary
        .run(&default_registry(), &setup, &benchmark, &descriptor)
        .await;

    match outcome {
        Err(PrimaryError::PhaseFailed { phase, errors }) => {
            assert_eq!(phase, Command::Workload);
            assert_eq!(errors.len(), 1);
            assert!(errors[0].to_string().contains("unknown ledger type"));
        }
        other => panic!("Expected workload failure, got {:?}", other),
    }
    good.await.unwrap().unwrap();
    bad.await.unwrap().unwrap();
}

#[traced_test]
#[tokio::test]
async fn test_degrade_policy_continues_without_failed_secondary() {
    let files = write_files();
    let (descriptor, setup, benchmark) = load(&files, FaultPolicy::Degrade);

    let (listener, port) = bind().await;
    let good = spawn_secondary(default_registry(), port, &[]);
    let bad = spawn_secondary(AdapterRegistry::new(), port, &[]);

    let primary = Primary::accept(listener, 2).await.unwrap();
    let result = primary
        .run(&default_registry(), &setup, &benchmark, &descriptor)
        .await
        .unwrap();
    good.await.unwrap().unwrap();
    bad.await.unwrap().unwrap();

    let mut sizes: Vec<usize> = result
        .secondaries
        .iter()
        .map(|s| s.interactions().count())
        .collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![0, 5]);
    assert!(result.interactions().all(InteractionResult::is_complete));
}
