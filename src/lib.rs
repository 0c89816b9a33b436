//! # Setcache
//!
//! Guarded set-collection operations over a single self-healing Redis
//! connection.
//!
//! This crate re-exports [`setcache_core`] and the Redis transport from
//! [`setcache_redis`] so applications depend on one crate.

pub use setcache_core::*;
pub use setcache_redis::{
    ConnectionStatus, Connector, FaultKind, ReconnectingConnection, RedisBackendConnector,
    RedisConnector, Transport, TransportFault, redis_set_cache,
};
