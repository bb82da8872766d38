//! The secondary: runs its shard of the workload on the primary's command.
//!
//! ```text
//! Connected ──Prepare──▶ Prepared ──Workload──▶ Loaded ──Run──▶ Running
//!                                                                  │
//!                                               Finished ◀─Results─┘
//! ```
//!
//! `Prepare` resets to `Prepared` from any state except `Running`. `Fin`
//! ends the loop from any state. A command that does not fit the current
//! state is answered with `Err` and leaves the state untouched.

use ledgerbench_core::{AdapterError, AdapterRegistry, Client, ConnectionView, Environment};
use ledgerbench_protocol::{
    results_to_document, CodecError, Command, ControlStream, Document, ProtocolError,
    WorkloadMessage,
};
use ledgerbench_scheduler::{RunningScheduler, SchedulerConfig};
use ledgerbench_types::{LedgerType, SecondaryResult, WorkloadShard};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Errors that end a secondary.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Failed to connect to primary at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Control connection failed: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Reasons a command is answered with `Err`.
#[derive(Debug, Error)]
enum CommandError {
    #[error("{command} not allowed while {state}")]
    UnexpectedCommand { command: Command, state: &'static str },

    #[error("malformed workload: {0}")]
    Malformed(#[from] CodecError),

    #[error("unknown ledger type: {0}")]
    UnknownLedger(LedgerType),

    #[error("failed to create client: {0}")]
    Adapter(#[from] AdapterError),
}

/// How a secondary reaches its primary and runs its shard.
#[derive(Debug, Clone)]
pub struct SecondaryConfig {
    /// Host of the primary.
    pub primary: String,

    /// Control port of the primary.
    pub port: u16,

    /// `key=value` strings handed to the adapter.
    pub env: Environment,

    /// Free-form tags handed to the adapter.
    pub tags: Vec<String>,

    /// Number of concurrent lanes.
    pub lanes: usize,
}

impl SecondaryConfig {
    pub fn new(primary: impl Into<String>, port: u16) -> Self {
        Self {
            primary: primary.into(),
            port,
            env: Environment::default(),
            tags: Vec::new(),
            lanes: 1,
        }
    }

    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes.max(1);
        self
    }
}

enum State {
    Connected,
    Prepared,
    Loaded {
        client: Arc<dyn Client>,
        shard: Arc<WorkloadShard>,
        scheduler: SchedulerConfig,
    },
    Running(RunningScheduler),
    Finished(SecondaryResult),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Prepared => "prepared",
            Self::Loaded { .. } => "loaded",
            Self::Running(_) => "running",
            Self::Finished(_) => "finished",
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A secondary node.
pub struct Secondary {
    registry: AdapterRegistry,
    config: SecondaryConfig,
    state: State,
}

impl Secondary {
    pub fn new(registry: AdapterRegistry, config: SecondaryConfig) -> Self {
        Self {
            registry,
            config,
            state: State::Connected,
        }
    }

    /// Dial the primary and serve its commands until `Fin`.
    pub async fn run(self) -> Result<(), ServeError> {
        let addr = format!("{}:{}", self.config.primary, self.config.port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ServeError::Connect {
                addr: addr.clone(),
                source,
            })?;
        stream
            .set_nodelay(true)
            .map_err(|source| ServeError::Connect {
                addr: addr.clone(),
                source,
            })?;
        info!(%addr, lanes = self.config.lanes, "Connected to primary");
        self.serve(ControlStream::new(stream)).await
    }

    /// Serve commands on an established control stream.
    ///
    /// Returns when the primary sends `Fin` or closes the connection. Any
    /// I/O failure ends the loop with an error; there is no reconnect.
    pub async fn serve<S>(mut self, mut stream: ControlStream<S>) -> Result<(), ServeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let Some(command) = stream.recv_command().await? else {
                warn!(state = ?self.state, "Primary closed the connection");
                return Ok(());
            };
            debug!(%command, state = ?self.state, "Command received");

            match command {
                Command::Prepare => {
                    let outcome = self.prepare();
                    reply(&mut stream, command, outcome).await?;
                }
                Command::Workload => {
                    let outcome = match stream.recv_document().await {
                        Ok(document) => self.load(document).await,
                        // The body was not read, so the stream is out of sync.
                        Err(e @ ProtocolError::Codec(CodecError::DocumentTooLarge(_))) => {
                            return Err(e.into());
                        }
                        Err(ProtocolError::Codec(e)) => Err(CommandError::Malformed(e)),
                        Err(e) => return Err(e.into()),
                    };
                    reply(&mut stream, command, outcome).await?;
                }
                Command::Run => {
                    let outcome = self.start(Instant::now());
                    reply(&mut stream, command, outcome).await?;
                }
                Command::Results => match self.finish().await {
                    Ok(result) => match results_to_document(&result) {
                        Ok(document) => {
                            stream.send_ok().await?;
                            stream.send_document(&document).await?;
                        }
                        Err(e) => stream.send_err(&e.to_string()).await?,
                    },
                    Err(e) => reply(&mut stream, command, Err(e)).await?,
                },
                Command::Fin => {
                    info!("Benchmark finished");
                    return Ok(());
                }
            }
        }
    }

    fn unexpected(&self, command: Command) -> CommandError {
        CommandError::UnexpectedCommand {
            command,
            state: self.state.name(),
        }
    }

    fn prepare(&mut self) -> Result<(), CommandError> {
        if matches!(self.state, State::Running(_)) {
            return Err(self.unexpected(Command::Prepare));
        }
        self.state = State::Prepared;
        Ok(())
    }

    async fn load(&mut self, document: Document) -> Result<(), CommandError> {
        if !matches!(self.state, State::Prepared | State::Loaded { .. }) {
            return Err(self.unexpected(Command::Workload));
        }

        let message = WorkloadMessage::from_document(document)?;
        let adapter = self
            .registry
            .get(&message.ledger_type)
            .ok_or_else(|| CommandError::UnknownLedger(message.ledger_type.clone()))?;

        let parameters = message.parameters;
        let view = ConnectionView {
            endpoints: parameters.endpoints,
            parameters: parameters.parameters,
            env: self.config.env.clone(),
            tags: self.config.tags.clone(),
        };
        let client = adapter.client(&view).await?;

        let scheduler = SchedulerConfig::default()
            .with_lanes(self.config.lanes)
            .with_max_delay(parameters.max_delay)
            .with_max_skew(parameters.max_skew);

        info!(
            ledger = %message.ledger_type,
            interactions = message.shard.len(),
            lanes = scheduler.lanes,
            "Workload loaded"
        );
        self.state = State::Loaded {
            client,
            shard: Arc::new(message.shard),
            scheduler,
        };
        Ok(())
    }

    fn start(&mut self, origin: Instant) -> Result<(), CommandError> {
        match std::mem::replace(&mut self.state, State::Connected) {
            State::Loaded {
                client,
                shard,
                scheduler,
            } => {
                self.state = State::Running(RunningScheduler::spawn(
                    shard, client, &scheduler, origin,
                ));
                Ok(())
            }
            other => {
                self.state = other;
                Err(self.unexpected(Command::Run))
            }
        }
    }

    async fn finish(&mut self) -> Result<SecondaryResult, CommandError> {
        match std::mem::replace(&mut self.state, State::Connected) {
            State::Running(scheduler) => {
                let (result, errors) = scheduler.join().await;
                for (lane, error) in &errors {
                    warn!(%lane, %error, "Lane stopped early");
                }
                self.state = State::Finished(result.clone());
                Ok(result)
            }
            State::Finished(result) => {
                self.state = State::Finished(result.clone());
                Ok(result)
            }
            other => {
                self.state = other;
                Err(self.unexpected(Command::Results))
            }
        }
    }
}

async fn reply<S>(
    stream: &mut ControlStream<S>,
    command: Command,
    outcome: Result<(), CommandError>,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match outcome {
        Ok(()) => stream.send_ok().await,
        Err(e) => {
            warn!(%command, error = %e, "Rejecting command");
            stream.send_err(&e.to_string()).await
        }
    }
}
