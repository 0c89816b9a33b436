//! Backend seams: the connected store and the thing that connects to it

use std::sync::Arc;

use async_trait::async_trait;

use crate::command::SetCommand;
use crate::config::{CacheConfig, Endpoint};
use crate::error::CacheResult;
use crate::reply::RawReply;

/// A connected set store
///
/// Implementations must support concurrent calls on a shared reference;
/// the cache hands the same backend to every caller.
#[async_trait]
pub trait SetBackend: Send + Sync {
    /// Run one command and return the store's reply
    async fn execute(&self, command: &SetCommand) -> CacheResult<RawReply>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Builds a connected [`SetBackend`] for an endpoint
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        config: &CacheConfig,
    ) -> CacheResult<Arc<dyn SetBackend>>;
}
