//! # Setcache Redis
//!
//! Redis transport for [`setcache_core::SetCache`].
//!
//! [`RedisBackendConnector`] opens one multiplexed connection per
//! [`SetCache::connect`](setcache_core::SetCache::connect) and wraps it in a
//! [`ReconnectingConnection`], which applies the configured
//! [`ReconnectPolicy`](setcache_core::ReconnectPolicy) whenever a command fails.
//!
//! ## Example
//!
//! ```rust,no_run
//! use setcache_core::CacheConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cache = setcache_redis::redis_set_cache(CacheConfig::new("127.0.0.1:6379"));
//!     cache.connect().await;
//!
//!     let added = cache.add_members("numbers", &[1, 2, 3]).await;
//!     println!("added: {:?}", added.ok());
//! }
//! ```

pub mod connection;
pub mod redis_transport;
pub mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use setcache_core::{
    BackendConnector, CacheConfig, CacheResult, Endpoint, SetBackend, SetCache,
};

pub use connection::{ConnectionStatus, ReconnectingConnection};
pub use redis_transport::RedisConnector;
pub use transport::{Connector, FaultKind, Transport, TransportFault};

/// Connects a [`SetCache`] to Redis
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisBackendConnector;

#[async_trait]
impl BackendConnector for RedisBackendConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        config: &CacheConfig,
    ) -> CacheResult<Arc<dyn SetBackend>> {
        let connector = RedisConnector::new(endpoint, config.connect_timeout)?;
        let connection = ReconnectingConnection::connect(connector, config.reconnect).await?;
        Ok(Arc::new(connection))
    }
}

/// A disconnected cache that will connect to Redis
pub fn redis_set_cache(config: CacheConfig) -> SetCache {
    SetCache::with_connector(config, RedisBackendConnector)
}
