//! Transport seams used by [`ReconnectingConnection`](crate::ReconnectingConnection)

use std::fmt;

use async_trait::async_trait;
use setcache_core::{CacheError, RawReply, SetCommand};

/// How a transport failure presented itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The server answered with an error reply
    Reply,
    /// The connection was refused, reset or closed
    ConnectionDropped,
    /// The server did not answer in time
    Timeout,
    /// Anything else (protocol, decoding, client-side errors)
    Other,
}

/// A failure reported by a transport, with the message used for classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFault {
    pub kind: FaultKind,
    pub message: String,
}

impl TransportFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn reply(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Reply, message)
    }

    pub fn dropped(message: impl Into<String>) -> Self {
        Self::new(FaultKind::ConnectionDropped, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Timeout, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Other, message)
    }

    /// Convert into the error reported for a failed command
    pub fn into_command_error(self, command: &SetCommand) -> CacheError {
        match self.kind {
            FaultKind::ConnectionDropped => CacheError::ConnectionFailed(self.message),
            FaultKind::Reply | FaultKind::Timeout | FaultKind::Other => CacheError::CommandFailed {
                command: command.op.command().to_string(),
                message: self.message,
            },
        }
    }

    /// Convert into the error reported for a failed connect
    pub fn into_connect_error(self) -> CacheError {
        CacheError::ConnectionFailed(self.message)
    }
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// An open connection that can carry set commands
///
/// Implementations must allow concurrent `send` calls on a shared reference.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, command: &SetCommand) -> Result<RawReply, TransportFault>;
}

/// Opens transports; called once at startup and again for each reconnect attempt
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Transport;

    async fn connect(&self) -> Result<Self::Conn, TransportFault>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
