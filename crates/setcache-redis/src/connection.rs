//! Shared connection with policy-driven reconnect episodes
//!
//! One transport is shared by every caller. When a command fails in a way
//! the [`ReconnectPolicy`] considers fixable by reconnecting, the connection
//! runs a reconnect episode:
//!
//! - the attempt counter starts at 1 for each episode
//! - before every attempt the policy either returns a delay or stops
//! - on success the transport is replaced and the failed command is sent again
//! - on stop the connection is closed and later commands fail fast
//!
//! Failures seen by concurrent callers on the same transport generation
//! share a single episode.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use setcache_core::{
    CacheError, CacheResult, RawReply, ReconnectPolicy, RetryDecision, SetBackend, SetCommand,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::transport::{Connector, FaultKind, Transport, TransportFault};

/// Lifecycle of the shared transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Ready,
    Reconnecting,
    /// A reconnect episode gave up; no further commands are sent
    Closed,
}

struct State<T> {
    transport: Option<Arc<T>>,
    generation: u64,
    status: ConnectionStatus,
}

/// A transport plus the policy that decides when and how to replace it
pub struct ReconnectingConnection<C: Connector> {
    connector: C,
    policy: ReconnectPolicy,
    state: RwLock<State<C::Conn>>,
    episode: Mutex<()>,
    reconnects: AtomicU64,
}

impl<C: Connector> ReconnectingConnection<C> {
    /// Open the initial transport
    ///
    /// The initial connect is tried once; the policy only governs
    /// reconnects after this has succeeded.
    pub async fn connect(connector: C, policy: ReconnectPolicy) -> CacheResult<Self> {
        let transport = connector
            .connect()
            .await
            .map_err(TransportFault::into_connect_error)?;

        debug!(backend = connector.name(), "Initial transport established");

        Ok(Self {
            connector,
            policy,
            state: RwLock::new(State {
                transport: Some(Arc::new(transport)),
                generation: 0,
                status: ConnectionStatus::Ready,
            }),
            episode: Mutex::new(()),
            reconnects: AtomicU64::new(0),
        })
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.state.read().await.status
    }

    /// Number of successful reconnects so far
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    async fn current(&self) -> CacheResult<(Arc<C::Conn>, u64)> {
        let state = self.state.read().await;
        match (&state.transport, state.status) {
            (_, ConnectionStatus::Closed) | (None, _) => Err(CacheError::ConnectionClosed),
            (Some(transport), _) => Ok((transport.clone(), state.generation)),
        }
    }

    /// Dropped connections always reconnect; error replies only when the
    /// policy's classifier accepts the message
    fn wants_reconnect(&self, fault: &TransportFault) -> bool {
        match fault.kind {
            FaultKind::ConnectionDropped => true,
            FaultKind::Reply => self.policy.should_reconnect(&fault.message),
            FaultKind::Timeout | FaultKind::Other => false,
        }
    }

    async fn reconnect(&self, seen: u64, cause: &TransportFault) -> CacheResult<Arc<C::Conn>> {
        let _episode = self.episode.lock().await;

        {
            let state = self.state.read().await;
            if state.generation != seen {
                // Another caller already finished an episode for this transport
                return match (&state.transport, state.status) {
                    (Some(transport), ConnectionStatus::Ready) => Ok(transport.clone()),
                    _ => Err(CacheError::ConnectionClosed),
                };
            }
        }

        self.state.write().await.status = ConnectionStatus::Reconnecting;
        warn!(
            backend = self.connector.name(),
            cause = %cause,
            "Starting reconnect episode"
        );

        let mut attempts: u32 = 0;
        let mut last_error = cause.message.clone();
        loop {
            attempts += 1;
            let delay = match self.policy.retry_decision(attempts) {
                RetryDecision::RetryAfter(delay) => delay,
                RetryDecision::Stop => {
                    let mut state = self.state.write().await;
                    state.transport = None;
                    state.generation += 1;
                    state.status = ConnectionStatus::Closed;

                    let tries = attempts - 1;
                    error!(
                        backend = self.connector.name(),
                        attempts = tries,
                        error = %last_error,
                        "Reconnect gave up, closing connection"
                    );
                    return Err(CacheError::ReconnectExhausted {
                        attempts: tries,
                        last_error,
                    });
                }
            };

            debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
            tokio::time::sleep(delay).await;

            match self.connector.connect().await {
                Ok(transport) => {
                    let transport = Arc::new(transport);
                    let mut state = self.state.write().await;
                    state.transport = Some(transport.clone());
                    state.generation += 1;
                    state.status = ConnectionStatus::Ready;
                    self.reconnects.fetch_add(1, Ordering::Relaxed);

                    info!(
                        backend = self.connector.name(),
                        attempt = attempts,
                        "Reconnected"
                    );
                    return Ok(transport);
                }
                Err(fault) => {
                    warn!(attempt = attempts, error = %fault, "Reconnect attempt failed");
                    last_error = fault.message;
                }
            }
        }
    }
}

#[async_trait]
impl<C: Connector> SetBackend for ReconnectingConnection<C> {
    async fn execute(&self, command: &SetCommand) -> CacheResult<RawReply> {
        let (transport, generation) = self.current().await?;

        let fault = match transport.send(command).await {
            Ok(reply) => return Ok(reply),
            Err(fault) => fault,
        };

        if !self.wants_reconnect(&fault) {
            return Err(fault.into_command_error(command));
        }

        let transport = self.reconnect(generation, &fault).await?;
        debug!(command = %command, "Resending command after reconnect");
        transport
            .send(command)
            .await
            .map_err(|f| f.into_command_error(command))
    }

    fn name(&self) -> &'static str {
        self.connector.name()
    }
}
