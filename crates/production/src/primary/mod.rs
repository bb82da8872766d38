//! The primary: coordinates secondaries through the benchmark phases.
//!
//! Every phase fans a command out to all active secondaries concurrently and
//! waits for every answer before returning. A phase never fails as a whole
//! because one secondary did; it returns the per-secondary errors and the
//! caller applies its [`FaultPolicy`].

mod connection;

pub use connection::{SecondaryError, SecondaryFailure};

use crate::config::{BenchmarkConfig, BenchmarkDescriptor, FaultPolicy, SetupConfig};
use crate::planner::{plan, PlanError};
use connection::{Request, Response, SecondaryHandle};
use futures::future::join_all;
use ledgerbench_core::{AdapterError, AdapterRegistry};
use ledgerbench_protocol::{Command, ProtocolError, RunParameters, WorkloadMessage};
use ledgerbench_types::{
    BenchmarkResult, LedgerType, SecondaryId, SecondaryResult, WorkloadShard,
};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, warn};

/// Errors that end a run on the primary.
#[derive(Debug, Error)]
pub enum PrimaryError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Expected {expected} shards, got {actual}")]
    ShardCount { expected: usize, actual: usize },

    #[error("{phase} phase failed on {} secondaries", .errors.len())]
    PhaseFailed {
        phase: Command,
        errors: Vec<SecondaryError>,
    },

    #[error("No secondaries left to run the benchmark")]
    NoSecondaries,

    #[error("Unknown ledger type: {0}")]
    UnknownLedger(LedgerType),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Planning failed: {0}")]
    Plan(#[from] PlanError),
}

/// Connected secondaries, in arrival order.
pub struct Primary {
    secondaries: Vec<SecondaryHandle>,

    /// Secondaries dropped by the degrade policy.
    excluded: Vec<bool>,
}

impl Primary {
    /// Listen on `addr` and wait until `expected` secondaries have connected.
    pub async fn listen<A: ToSocketAddrs>(
        addr: A,
        expected: usize,
    ) -> Result<Self, PrimaryError> {
        let listener = TcpListener::bind(addr).await?;
        Self::accept(listener, expected).await
    }

    /// Accept `expected` secondaries on an already bound listener.
    pub async fn accept(listener: TcpListener, expected: usize) -> Result<Self, PrimaryError> {
        let local: SocketAddr = listener.local_addr()?;
        info!(%local, expected, "Waiting for secondaries");

        let mut secondaries = Vec::with_capacity(expected);
        while secondaries.len() < expected {
            let (stream, peer) = listener.accept().await?;
            stream.set_nodelay(true)?;
            let id = SecondaryId(secondaries.len());
            info!(%id, %peer, "Secondary connected");
            secondaries.push(SecondaryHandle::spawn(id, stream));
        }
        Ok(Self::from_handles(secondaries))
    }

    /// Drive already established control streams, one per secondary.
    pub fn from_streams<S>(streams: Vec<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let secondaries = streams
            .into_iter()
            .enumerate()
            .map(|(i, stream)| SecondaryHandle::spawn(SecondaryId(i), stream))
            .collect();
        Self::from_handles(secondaries)
    }

    fn from_handles(secondaries: Vec<SecondaryHandle>) -> Self {
        let excluded = vec![false; secondaries.len()];
        Self {
            secondaries,
            excluded,
        }
    }

    /// Number of connected secondaries, including excluded ones.
    pub fn len(&self) -> usize {
        self.secondaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secondaries.is_empty()
    }

    /// Secondaries still taking part in the run.
    pub fn active(&self) -> impl Iterator<Item = SecondaryId> + '_ {
        self.secondaries
            .iter()
            .map(SecondaryHandle::id)
            .filter(|id| !self.excluded[id.index()])
    }

    /// Drop secondaries from all later phases.
    pub fn exclude(&mut self, ids: impl IntoIterator<Item = SecondaryId>) {
        for id in ids {
            if let Some(excluded) = self.excluded.get_mut(id.index()) {
                if !*excluded {
                    warn!(%id, "Excluding secondary from the run");
                }
                *excluded = true;
            }
        }
    }

    async fn fan_out(
        &self,
        requests: Vec<(SecondaryId, Request)>,
    ) -> Vec<(SecondaryId, Response)> {
        let calls = requests.into_iter().map(|(id, request)| {
            let handle = &self.secondaries[id.index()];
            async move { (id, handle.call(request).await) }
        });
        join_all(calls).await
    }

    async fn phase(&self, phase: Command, make: impl Fn() -> Request) -> Vec<SecondaryError> {
        let requests = self.active().map(|id| (id, make())).collect();
        let errors = failures(phase, self.fan_out(requests).await);
        log_phase(phase, &errors);
        errors
    }

    /// Ask every secondary to reset its state.
    pub async fn prepare(&self) -> Vec<SecondaryError> {
        self.phase(Command::Prepare, || Request::Prepare).await
    }

    /// Send each active secondary its shard, with the ledger type and run
    /// parameters.
    ///
    /// There must be one shard per active secondary; `shards[k]` goes to the
    /// `k`-th active secondary in arrival order.
    pub async fn distribute_workload(
        &self,
        ledger_type: &LedgerType,
        parameters: &RunParameters,
        shards: Vec<WorkloadShard>,
    ) -> Result<Vec<SecondaryError>, PrimaryError> {
        let active: Vec<SecondaryId> = self.active().collect();
        if shards.len() != active.len() {
            return Err(PrimaryError::ShardCount {
                expected: active.len(),
                actual: shards.len(),
            });
        }

        let mut errors = Vec::new();
        let mut requests = Vec::new();
        for (id, shard) in active.into_iter().zip(shards) {
            let message = WorkloadMessage {
                ledger_type: ledger_type.clone(),
                parameters: parameters.clone(),
                shard,
            };
            match message.to_document() {
                Ok(document) => requests.push((id, Request::Workload(document))),
                Err(e) => errors.push(SecondaryError {
                    secondary: id,
                    phase: Command::Workload,
                    failure: SecondaryFailure::Comm(ProtocolError::Codec(e)),
                }),
            }
        }

        errors.extend(failures(Command::Workload, self.fan_out(requests).await));
        errors.sort_by_key(|e| e.secondary);
        log_phase(Command::Workload, &errors);
        Ok(errors)
    }

    /// Start the scheduler on every secondary.
    pub async fn run_benchmark(&self) -> Vec<SecondaryError> {
        self.phase(Command::Run, || Request::Run).await
    }

    /// Wait for every secondary to finish and gather their results.
    ///
    /// The result has one slot per connected secondary, in arrival order.
    /// Excluded or failing secondaries leave an empty slot.
    pub async fn collect_results(&self) -> (BenchmarkResult, Vec<SecondaryError>) {
        let requests = self.active().map(|id| (id, Request::Results)).collect();
        let mut slots = vec![SecondaryResult::default(); self.len()];
        let mut errors = Vec::new();

        for (id, response) in self.fan_out(requests).await {
            match response {
                Ok(result) => slots[id.index()] = result.unwrap_or_default(),
                Err(failure) => errors.push(SecondaryError {
                    secondary: id,
                    phase: Command::Results,
                    failure,
                }),
            }
        }
        log_phase(Command::Results, &errors);
        (BenchmarkResult::new(slots), errors)
    }

    /// Send `Fin` to every secondary and close all connections.
    pub async fn finish(self) {
        let requests = self
            .secondaries
            .iter()
            .map(|handle| (handle.id(), Request::Fin))
            .collect();
        for (id, response) in self.fan_out(requests).await {
            if let Err(failure) = response {
                warn!(%id, %failure, "Failed to send fin");
            }
        }
        join_all(self.secondaries.into_iter().map(SecondaryHandle::close)).await;
        info!("All secondaries closed");
    }

    /// Apply the fault policy to the errors of one phase.
    fn settle(
        &mut self,
        phase: Command,
        errors: Vec<SecondaryError>,
        policy: FaultPolicy,
    ) -> Result<(), PrimaryError> {
        if errors.is_empty() {
            return Ok(());
        }
        match policy {
            FaultPolicy::Abort => Err(PrimaryError::PhaseFailed { phase, errors }),
            FaultPolicy::Degrade => {
                self.exclude(errors.into_iter().map(|e| e.secondary));
                if self.active().next().is_none() {
                    return Err(PrimaryError::NoSecondaries);
                }
                Ok(())
            }
        }
    }

    async fn phases(
        &mut self,
        registry: &AdapterRegistry,
        setup: &SetupConfig,
        benchmark: &BenchmarkConfig,
        descriptor: &BenchmarkDescriptor,
    ) -> Result<BenchmarkResult, PrimaryError> {
        let policy = descriptor.fault_policy;
        let adapter = registry
            .get(&setup.ledger)
            .ok_or_else(|| PrimaryError::UnknownLedger(setup.ledger.clone()))?;

        let errors = self.prepare().await;
        self.settle(Command::Prepare, errors, policy)?;

        let mut builder = adapter
            .builder(&setup.parameters, &descriptor.env, &setup.endpoints)
            .await?;
        let active = self.active().count();
        let shards = plan(builder.as_mut(), benchmark, active, descriptor.seed).await?;

        let parameters = RunParameters {
            endpoints: setup.endpoints.clone(),
            parameters: setup.parameters.clone(),
            max_delay: descriptor.max_delay,
            max_skew: descriptor.max_skew,
        };
        let errors = self
            .distribute_workload(&setup.ledger, &parameters, shards)
            .await?;
        self.settle(Command::Workload, errors, policy)?;

        let errors = self.run_benchmark().await;
        self.settle(Command::Run, errors, policy)?;

        let (result, errors) = self.collect_results().await;
        self.settle(Command::Results, errors, policy)?;
        Ok(result)
    }

    /// Drive a whole benchmark and close every connection.
    ///
    /// Secondaries are sent `Fin` whether or not the run succeeded.
    pub async fn run(
        mut self,
        registry: &AdapterRegistry,
        setup: &SetupConfig,
        benchmark: &BenchmarkConfig,
        descriptor: &BenchmarkDescriptor,
    ) -> Result<BenchmarkResult, PrimaryError> {
        let outcome = self.phases(registry, setup, benchmark, descriptor).await;
        self.finish().await;
        outcome
    }
}

fn failures(phase: Command, responses: Vec<(SecondaryId, Response)>) -> Vec<SecondaryError> {
    responses
        .into_iter()
        .filter_map(|(secondary, response)| {
            response.err().map(|failure| SecondaryError {
                secondary,
                phase,
                failure,
            })
        })
        .collect()
}

fn log_phase(phase: Command, errors: &[SecondaryError]) {
    for error in errors {
        warn!(secondary = %error.secondary, %phase, failure = %error.failure, "Secondary failed");
    }
    info!(%phase, failed = errors.len(), "Phase complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secondary::{Secondary, SecondaryConfig};
    use async_trait::async_trait;
    use ledgerbench_core::{
        Adapter, AdapterParams, Builder, Client, ConnectionView, EndpointGroups, Environment,
    };
    use ledgerbench_mock::{MockAdapter, MockBuilder};
    use ledgerbench_protocol::{results_to_document, ControlStream};
    use ledgerbench_types::{ClientResult, InteractionResult};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::io::{duplex, DuplexStream};
    use tracing_test::traced_test;

    /// A scripted secondary that answers every command with `Ok`, except
    /// the one named in `reject`.
    async fn fake_secondary(stream: DuplexStream, reject: Option<Command>) -> Vec<Command> {
        let mut stream = ControlStream::new(stream);
        let mut seen = Vec::new();
        while let Ok(Some(command)) = stream.recv_command().await {
            seen.push(command);
            if command == Command::Workload {
                stream.recv_document().await.unwrap();
            }
            if reject == Some(command) {
                stream.send_err("scripted").await.unwrap();
                continue;
            }
            match command {
                Command::Fin => break,
                Command::Results => {
                    let result = SecondaryResult::new(vec![ClientResult {
                        interactions: vec![InteractionResult::unreached()],
                    }]);
                    stream.send_ok().await.unwrap();
                    stream
                        .send_document(&results_to_document(&result).unwrap())
                        .await
                        .unwrap();
                }
                _ => stream.send_ok().await.unwrap(),
            }
        }
        seen
    }

    fn spawn_fakes(
        rejects: &[Option<Command>],
    ) -> (Primary, Vec<tokio::task::JoinHandle<Vec<Command>>>) {
        let mut streams = Vec::new();
        let mut fakes = Vec::new();
        for reject in rejects {
            let (near, far) = duplex(64 * 1024);
            streams.push(near);
            fakes.push(tokio::spawn(fake_secondary(far, *reject)));
        }
        (Primary::from_streams(streams), fakes)
    }

    #[traced_test]
    #[tokio::test]
    async fn test_phases_in_order() {
        let (primary, fakes) = spawn_fakes(&[None, None]);

        assert!(primary.prepare().await.is_empty());
        let errors = primary
            .distribute_workload(
                &LedgerType::new("mock"),
                &RunParameters::default(),
                vec![Vec::new(), Vec::new()],
            )
            .await
            .unwrap();
        assert!(errors.is_empty());
        assert!(primary.run_benchmark().await.is_empty());
        let (result, errors) = primary.collect_results().await;
        assert!(errors.is_empty());
        assert_eq!(result.secondaries.len(), 2);
        primary.finish().await;

        for fake in fakes {
            assert_eq!(
                fake.await.unwrap(),
                vec![
                    Command::Prepare,
                    Command::Workload,
                    Command::Run,
                    Command::Results,
                    Command::Fin
                ]
            );
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn test_error_reply_attributed_to_secondary() {
        let (primary, _fakes) = spawn_fakes(&[None, Some(Command::Prepare)]);

        let errors = primary.prepare().await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].secondary, SecondaryId(1));
        assert_eq!(errors[0].phase, Command::Prepare);
        assert!(matches!(errors[0].failure, SecondaryFailure::ErrorReply(_)));
        primary.finish().await;
    }

    #[tokio::test]
    async fn test_shard_count_must_match() {
        let (primary, _fakes) = spawn_fakes(&[None, None]);
        let result = primary
            .distribute_workload(&LedgerType::new("mock"), &RunParameters::default(), vec![])
            .await;
        assert!(matches!(
            result,
            Err(PrimaryError::ShardCount {
                expected: 2,
                actual: 0
            })
        ));
        primary.finish().await;
    }

    #[traced_test]
    #[tokio::test]
    async fn test_excluded_secondary_leaves_empty_slot() {
        let (mut primary, fakes) = spawn_fakes(&[None, None]);

        primary.exclude([SecondaryId(0)]);
        assert_eq!(primary.active().collect::<Vec<_>>(), vec![SecondaryId(1)]);

        let (result, errors) = primary.collect_results().await;
        assert!(errors.is_empty());
        assert!(result.secondaries[0].clients.is_empty());
        assert_eq!(result.secondaries[1].clients.len(), 1);
        primary.finish().await;

        let seen: Vec<Vec<Command>> = join_all(fakes)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(seen[0], vec![Command::Fin]);
        assert_eq!(seen[1], vec![Command::Results, Command::Fin]);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_shards_go_to_active_secondaries() {
        let (mut primary, fakes) = spawn_fakes(&[None, None]);
        primary.exclude([SecondaryId(0)]);

        let result = primary
            .distribute_workload(
                &LedgerType::new("mock"),
                &RunParameters::default(),
                vec![Vec::new(), Vec::new()],
            )
            .await;
        assert!(matches!(
            result,
            Err(PrimaryError::ShardCount {
                expected: 1,
                actual: 2
            })
        ));

        let errors = primary
            .distribute_workload(
                &LedgerType::new("mock"),
                &RunParameters::default(),
                vec![Vec::new()],
            )
            .await
            .unwrap();
        assert!(errors.is_empty());
        primary.finish().await;

        let seen: Vec<Vec<Command>> = join_all(fakes)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        assert_eq!(seen[0], vec![Command::Fin]);
        assert_eq!(seen[1], vec![Command::Workload, Command::Fin]);
    }

    fn configs(policy: FaultPolicy) -> (SetupConfig, BenchmarkConfig, BenchmarkDescriptor) {
        let setup = SetupConfig::parse(
            r#"
            ledger = "mock"

            [parameters]
            delay_ms = "1"
            "#,
        )
        .unwrap();
        let benchmark = BenchmarkConfig::parse(
            r#"
            [accounts]
            count = 4

            [[workloads]]
            kind = "transfer"
            rate = 20.0
            duration = "500ms"
            "#,
        )
        .unwrap();
        let descriptor = BenchmarkDescriptor::new(2, PathBuf::new(), PathBuf::new())
            .with_seed(3)
            .with_fault_policy(policy);
        (setup, benchmark, descriptor)
    }

    #[traced_test]
    #[tokio::test]
    async fn test_degrade_plans_across_surviving_secondaries() {
        let (setup, benchmark, descriptor) = configs(FaultPolicy::Degrade);
        assert_eq!(benchmark.total_interactions(), 10);

        let (rejecting, rejecting_far) = duplex(64 * 1024);
        let rejecting_task = tokio::spawn(fake_secondary(rejecting_far, Some(Command::Prepare)));
        let (serving, serving_far) = duplex(64 * 1024);
        let secondary = Secondary::new(
            crate::default_registry(),
            SecondaryConfig::new("localhost", 0),
        );
        let serving_task = tokio::spawn(secondary.serve(ControlStream::new(serving_far)));

        let primary = Primary::from_streams(vec![rejecting, serving]);
        let result = primary
            .run(&crate::default_registry(), &setup, &benchmark, &descriptor)
            .await
            .unwrap();
        serving_task.await.unwrap().unwrap();
        assert_eq!(
            rejecting_task.await.unwrap(),
            vec![Command::Prepare, Command::Fin]
        );

        assert!(result.secondaries[0].clients.is_empty());
        assert_eq!(result.secondaries[1].interactions().count(), 10);
        assert!(result.interactions().all(InteractionResult::is_complete));
    }

    /// Mock adapter whose builder requires a `region` environment string.
    struct RegionAdapter;

    #[async_trait]
    impl Adapter for RegionAdapter {
        async fn builder(
            &self,
            _params: &AdapterParams,
            env: &Environment,
            _endpoints: &EndpointGroups,
        ) -> Result<Box<dyn Builder>, AdapterError> {
            match env.get("region") {
                Some("eu") => Ok(Box::new(MockBuilder::new())),
                other => Err(AdapterError::Config(format!("region {:?}", other))),
            }
        }

        async fn client(&self, view: &ConnectionView) -> Result<Arc<dyn Client>, AdapterError> {
            MockAdapter.client(view).await
        }
    }

    #[traced_test]
    #[tokio::test]
    async fn test_builder_receives_environment() {
        let registry = AdapterRegistry::new().with_adapter("mock", Arc::new(RegionAdapter));
        let (setup, benchmark, descriptor) = configs(FaultPolicy::Abort);

        let (primary, _fakes) = spawn_fakes(&[None, None]);
        let outcome = primary
            .run(&registry, &setup, &benchmark, &descriptor)
            .await;
        assert!(matches!(outcome, Err(PrimaryError::Adapter(_))));

        let descriptor = descriptor.with_env(Environment::new(vec!["region=eu".to_string()]));
        let (primary, _fakes) = spawn_fakes(&[None, None]);
        let result = primary
            .run(&registry, &setup, &benchmark, &descriptor)
            .await
            .unwrap();
        assert_eq!(result.secondaries.len(), 2);
    }

    #[tokio::test]
    async fn test_settle_policies() {
        let (mut primary, _fakes) = spawn_fakes(&[None, None]);
        let error = |id| SecondaryError {
            secondary: SecondaryId(id),
            phase: Command::Run,
            failure: SecondaryFailure::Disconnected,
        };

        assert!(primary
            .settle(Command::Run, vec![error(0)], FaultPolicy::Degrade)
            .is_ok());
        assert!(matches!(
            primary.settle(Command::Run, vec![error(1)], FaultPolicy::Degrade),
            Err(PrimaryError::NoSecondaries)
        ));
        assert!(matches!(
            primary.settle(Command::Run, vec![error(1)], FaultPolicy::Abort),
            Err(PrimaryError::PhaseFailed { .. })
        ));
        primary.finish().await;
    }
}
