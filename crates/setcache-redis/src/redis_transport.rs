//! Redis implementation of the transport seams
//!
//! Commands travel over one multiplexed connection; concurrent callers share
//! it without locking. Replies are converted into [`RawReply`] so the rest of
//! the stack never sees `redis::Value`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{RedisError, Value};
use setcache_core::{CacheError, CacheResult, Endpoint, RawReply, SetCommand};

use crate::transport::{Connector, FaultKind, Transport, TransportFault};

impl From<RedisError> for TransportFault {
    fn from(err: RedisError) -> Self {
        let kind = if err.is_connection_dropped() || err.is_connection_refusal() {
            FaultKind::ConnectionDropped
        } else if err.is_timeout() {
            FaultKind::Timeout
        } else if err.code().is_some() {
            FaultKind::Reply
        } else {
            FaultKind::Other
        };

        TransportFault::new(kind, fault_message(&err))
    }
}

/// Server replies are reported as `CODE detail` so the classifier sees the
/// code as the message prefix
fn fault_message(err: &RedisError) -> String {
    match (err.code(), err.detail()) {
        (Some(code), Some(detail)) => format!("{} {}", code, detail),
        (Some(code), None) => code.to_string(),
        _ => err.to_string(),
    }
}

fn to_redis_cmd(command: &SetCommand) -> redis::Cmd {
    let mut cmd = redis::cmd(command.op.command());
    cmd.arg(&command.key);
    for arg in &command.args {
        cmd.arg(arg);
    }
    cmd
}

fn raw_reply(value: Value) -> Result<RawReply, TransportFault> {
    match value {
        Value::Nil => Ok(RawReply::Nil),
        Value::Int(n) => Ok(RawReply::Int(n)),
        Value::BulkString(bytes) => String::from_utf8(bytes)
            .map(RawReply::Bulk)
            .map_err(|e| TransportFault::other(format!("reply is not valid UTF-8: {}", e))),
        Value::SimpleString(text) => Ok(RawReply::Bulk(text)),
        Value::Okay => Ok(RawReply::Bulk("OK".to_string())),
        Value::Boolean(flag) => Ok(RawReply::Int(i64::from(flag))),
        Value::Array(items) | Value::Set(items) => items
            .into_iter()
            .map(raw_reply)
            .collect::<Result<Vec<_>, _>>()
            .map(RawReply::Array),
        other => Err(TransportFault::other(format!(
            "unsupported reply type: {:?}",
            other
        ))),
    }
}

#[async_trait]
impl Transport for MultiplexedConnection {
    async fn send(&self, command: &SetCommand) -> Result<RawReply, TransportFault> {
        // Clones share the underlying multiplexed pipeline
        let mut conn = self.clone();
        let value: Value = to_redis_cmd(command).query_async(&mut conn).await?;
        raw_reply(value)
    }
}

/// Opens multiplexed Redis connections to one endpoint
#[derive(Clone)]
pub struct RedisConnector {
    client: redis::Client,
    connect_timeout: Duration,
}

impl RedisConnector {
    /// Build the client; no network traffic happens until [`Connector::connect`]
    pub fn new(endpoint: &Endpoint, connect_timeout: Duration) -> CacheResult<Self> {
        let client = redis::Client::open(endpoint.redis_url()).map_err(|e| {
            CacheError::ConnectionFailed(format!("Failed to create Redis client: {}", e))
        })?;

        Ok(Self {
            client,
            connect_timeout,
        })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Conn = MultiplexedConnection;

    async fn connect(&self) -> Result<MultiplexedConnection, TransportFault> {
        match tokio::time::timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(result) => result.map_err(TransportFault::from),
            Err(_) => Err(TransportFault::timeout(format!(
                "connect timed out after {:?}",
                self.connect_timeout
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
