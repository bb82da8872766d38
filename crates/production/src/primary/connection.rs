//! One task per secondary connection.
//!
//! The primary never touches a control stream directly. Each connection is
//! owned by a task that executes one request at a time and answers through a
//! oneshot channel, so a phase is just "send to every task, await every
//! answer".

use ledgerbench_protocol::{
    results_from_document, Command, ControlStream, Document, ProtocolError,
};
use ledgerbench_types::{SecondaryId, SecondaryResult};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Why a secondary failed a phase.
#[derive(Debug, Error)]
pub enum SecondaryFailure {
    /// I/O or framing failure on the control connection.
    #[error("communication error: {0}")]
    Comm(ProtocolError),

    /// The secondary answered `Err`.
    #[error("error reply: {0}")]
    ErrorReply(String),

    /// The connection task is gone.
    #[error("disconnected")]
    Disconnected,
}

impl From<ProtocolError> for SecondaryFailure {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Rejected(reason) => Self::ErrorReply(reason),
            other => Self::Comm(other),
        }
    }
}

/// A failure attributed to one secondary during one phase.
#[derive(Debug, Error)]
#[error("{secondary} failed {phase}: {failure}")]
pub struct SecondaryError {
    pub secondary: SecondaryId,
    pub phase: Command,
    #[source]
    pub failure: SecondaryFailure,
}

/// Work for a connection task.
#[derive(Debug)]
pub(crate) enum Request {
    Prepare,
    Workload(Document),
    Run,
    Results,
    Fin,
}

impl Request {
    pub(crate) fn command(&self) -> Command {
        match self {
            Self::Prepare => Command::Prepare,
            Self::Workload(_) => Command::Workload,
            Self::Run => Command::Run,
            Self::Results => Command::Results,
            Self::Fin => Command::Fin,
        }
    }
}

/// Results travel back only for `Results`.
pub(crate) type Response = Result<Option<SecondaryResult>, SecondaryFailure>;

type Call = (Request, oneshot::Sender<Response>);

/// Primary-side handle to a connection task.
pub(crate) struct SecondaryHandle {
    id: SecondaryId,
    requests: mpsc::Sender<Call>,
    task: JoinHandle<()>,
}

impl SecondaryHandle {
    /// Spawn the task owning `stream`.
    pub(crate) fn spawn<S>(id: SecondaryId, stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (requests, rx) = mpsc::channel(1);
        let connection = Connection {
            id,
            stream: ControlStream::new(stream),
        };
        let task = tokio::spawn(connection.run(rx));
        Self { id, requests, task }
    }

    pub(crate) fn id(&self) -> SecondaryId {
        self.id
    }

    /// Execute one request on the connection and wait for its answer.
    pub(crate) async fn call(&self, request: Request) -> Response {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send((request, tx))
            .await
            .map_err(|_| SecondaryFailure::Disconnected)?;
        rx.await.map_err(|_| SecondaryFailure::Disconnected)?
    }

    /// Close the request channel and wait for the task to end.
    pub(crate) async fn close(self) {
        drop(self.requests);
        let _ = self.task.await;
    }
}

struct Connection<S> {
    id: SecondaryId,
    stream: ControlStream<S>,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn run(mut self, mut requests: mpsc::Receiver<Call>) {
        while let Some((request, reply)) = requests.recv().await {
            let fin = matches!(request, Request::Fin);
            let response = self.execute(request).await;
            if let Err(failure) = &response {
                trace!(secondary = %self.id, %failure, "Request failed");
            }
            let _ = reply.send(response);
            if fin {
                break;
            }
        }
        debug!(secondary = %self.id, "Connection closed");
    }

    async fn execute(&mut self, request: Request) -> Response {
        self.stream.send_command(request.command()).await?;
        match request {
            Request::Prepare | Request::Run => {
                self.stream.recv_reply().await?;
                Ok(None)
            }
            Request::Workload(document) => {
                self.stream.send_document(&document).await?;
                self.stream.recv_reply().await?;
                Ok(None)
            }
            Request::Results => {
                self.stream.recv_reply().await?;
                let document = self.stream.recv_document().await?;
                let result = results_from_document(&document).map_err(ProtocolError::from)?;
                Ok(Some(result))
            }
            Request::Fin => Ok(None),
        }
    }
}
