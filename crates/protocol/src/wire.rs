//! Framed control stream shared by primary and secondary.

use crate::codec::{CodecError, Document, MAX_DOCUMENT_LEN};
use crate::command::{Command, Reply};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Errors on a control connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Unknown command byte 0x{0:02x}")]
    UnknownCommand(u8),

    #[error("Unknown reply byte 0x{0:02x}")]
    UnknownReply(u8),

    /// The peer answered `Err`.
    #[error("Peer replied with error: {0}")]
    Rejected(String),
}

/// A control connection speaking the command/reply protocol.
pub struct ControlStream<S> {
    stream: S,
}

impl<S> ControlStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send one command byte.
    pub async fn send_command(&mut self, command: Command) -> Result<(), ProtocolError> {
        self.stream.write_u8(command.as_byte()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next command byte. Returns `None` if the peer closed cleanly.
    pub async fn recv_command(&mut self) -> Result<Option<Command>, ProtocolError> {
        let byte = match self.stream.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Command::from_byte(byte)
            .map(Some)
            .ok_or(ProtocolError::UnknownCommand(byte))
    }

    /// Acknowledge the last command.
    pub async fn send_ok(&mut self) -> Result<(), ProtocolError> {
        self.stream.write_u8(Reply::Ok.as_byte()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Reject the last command, with a reason for the peer's logs.
    pub async fn send_err(&mut self, reason: &str) -> Result<(), ProtocolError> {
        self.stream.write_u8(Reply::Err.as_byte()).await?;
        self.write_document(&Document::from_text(reason)).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Wait for the reply to the last command.
    ///
    /// An `Err` reply surfaces as [`ProtocolError::Rejected`].
    pub async fn recv_reply(&mut self) -> Result<(), ProtocolError> {
        let byte = self.stream.read_u8().await?;
        match Reply::from_byte(byte) {
            Some(Reply::Ok) => Ok(()),
            Some(Reply::Err) => {
                let reason = self.recv_document().await?;
                let reason = reason.text(0).unwrap_or("unspecified").to_string();
                Err(ProtocolError::Rejected(reason))
            }
            None => Err(ProtocolError::UnknownReply(byte)),
        }
    }

    /// Send a length-delimited document.
    pub async fn send_document(&mut self, document: &Document) -> Result<(), ProtocolError> {
        self.write_document(document).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn write_document(&mut self, document: &Document) -> Result<(), ProtocolError> {
        let body = document.encode()?;
        let len = u32::try_from(body.len()).map_err(|_| CodecError::DocumentTooLarge(body.len()))?;
        self.stream.write_u32_le(len).await?;
        self.stream.write_all(&body).await?;
        Ok(())
    }

    /// Read one length-delimited document.
    pub async fn recv_document(&mut self) -> Result<Document, ProtocolError> {
        let len = self.stream.read_u32_le().await? as usize;
        if len > MAX_DOCUMENT_LEN {
            return Err(CodecError::DocumentTooLarge(len).into());
        }
        let mut body = vec![0u8; len];
        self.stream.read_exact(&mut body).await?;
        Ok(Document::decode(&body)?)
    }
}
