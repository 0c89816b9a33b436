//! Shared connection handle and guarded set operations
//!
//! [`SetCache`] owns the single connection handle for the process. Every
//! operation goes through one guard that checks for the handle, runs the
//! command, applies the operation's reply policy and contains any failure.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendConnector, SetBackend};
use crate::command::{ScanOptions, SetCommand, SetOp, encode_member, encode_members};
use crate::config::{CacheConfig, Endpoint};
use crate::error::{CacheError, CacheResult};
use crate::health::{CacheHealth, OperationMetrics};
use crate::outcome::OpOutcome;
use crate::reply::{self, Reply, ScanPage};

/// Installed handle plus the bookkeeping reported by [`SetCache::health`]
#[derive(Default)]
struct ConnectionSlot {
    backend: Option<Arc<dyn SetBackend>>,
    endpoint: Option<Endpoint>,
    connected_at: Option<Instant>,
    last_connect_error: Option<String>,
}

/// Resilient access layer over a set store
///
/// Created disconnected. [`connect`](Self::connect) installs the handle;
/// until it succeeds every operation returns [`OpOutcome::Unavailable`].
/// No operation ever returns an error or panics on a backend fault.
///
/// # Example
///
/// ```rust
/// use setcache_core::{CacheConfig, InMemoryConnector, SetCache};
///
/// # tokio_test::block_on(async {
/// let cache = SetCache::with_connector(
///     CacheConfig::new("localhost:6379"),
///     InMemoryConnector::default(),
/// );
/// assert!(cache.cardinality("numbers").await.is_unavailable());
///
/// cache.connect().await;
/// assert_eq!(cache.add_members("numbers", &[1, 2, 2]).await.ok(), Some(2));
/// assert_eq!(cache.cardinality("numbers").await.ok(), Some(2));
/// # });
/// ```
pub struct SetCache {
    config: CacheConfig,
    connector: Arc<dyn BackendConnector>,
    slot: RwLock<ConnectionSlot>,
    metrics: OperationMetrics,
}

impl SetCache {
    /// Create a disconnected cache that connects through `connector`
    pub fn with_connector(config: CacheConfig, connector: impl BackendConnector + 'static) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            slot: RwLock::new(ConnectionSlot::default()),
            metrics: OperationMetrics::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Connect to the configured endpoint
    ///
    /// Never fails: a bad endpoint, a refused connection or a timeout is
    /// logged and leaves the current handle as it was.
    pub async fn connect(&self) {
        let endpoint = self.config.endpoint.clone();
        self.connect_to(&endpoint).await;
    }

    /// Connect to an explicit `host:port` endpoint
    pub async fn connect_to(&self, endpoint: &str) {
        match self.try_connect(endpoint).await {
            Ok((endpoint, backend)) => {
                info!(
                    endpoint = %endpoint,
                    backend = backend.name(),
                    "Connected to cache"
                );
                self.update_slot(|slot| {
                    slot.backend = Some(backend);
                    slot.endpoint = Some(endpoint);
                    slot.connected_at = Some(Instant::now());
                    slot.last_connect_error = None;
                });
            }
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Failed to connect to cache");
                self.update_slot(|slot| slot.last_connect_error = Some(e.to_string()));
            }
        }
    }

    async fn try_connect(&self, raw: &str) -> CacheResult<(Endpoint, Arc<dyn SetBackend>)> {
        let endpoint: Endpoint = raw.parse()?;
        let timeout = self.config.connect_timeout;

        let backend = tokio::time::timeout(timeout, self.connector.connect(&endpoint, &self.config))
            .await
            .map_err(|_| CacheError::ConnectTimeout(timeout))??;

        Ok((endpoint, backend))
    }

    /// Install an already connected backend as the handle
    pub fn install(&self, backend: Arc<dyn SetBackend>) {
        debug!(backend = backend.name(), "Installing cache backend");
        self.update_slot(|slot| {
            slot.backend = Some(backend);
            slot.endpoint = None;
            slot.connected_at = Some(Instant::now());
            slot.last_connect_error = None;
        });
    }

    /// Whether a connection handle is installed
    pub fn is_connected(&self) -> bool {
        self.backend().is_some()
    }

    pub fn health(&self) -> CacheHealth {
        let metrics = self.metrics.snapshot();
        match self.slot.read() {
            Ok(slot) => CacheHealth {
                connected: slot.backend.is_some(),
                backend: slot.backend.as_ref().map(|b| b.name()),
                endpoint: slot.endpoint.as_ref().map(ToString::to_string),
                connected_for: slot.connected_at.map(|at| at.elapsed()),
                last_connect_error: slot.last_connect_error.clone(),
                metrics,
            },
            Err(e) => CacheHealth {
                connected: false,
                backend: None,
                endpoint: None,
                connected_for: None,
                last_connect_error: Some(format!("Lock poisoned: {}", e)),
                metrics,
            },
        }
    }

    fn backend(&self) -> Option<Arc<dyn SetBackend>> {
        self.slot.read().ok().and_then(|slot| slot.backend.clone())
    }

    fn update_slot(&self, f: impl FnOnce(&mut ConnectionSlot)) {
        match self.slot.write() {
            Ok(mut slot) => f(&mut slot),
            Err(e) => error!(error = %e, "Connection slot lock poisoned"),
        }
    }

    /// Run one command under the guard
    ///
    /// `args` is taken as a result so that member encoding failures are
    /// contained the same way as backend failures.
    async fn guarded<T>(
        &self,
        op: SetOp,
        key: &str,
        args: CacheResult<Vec<String>>,
        decode: fn(Reply) -> CacheResult<T>,
    ) -> OpOutcome<T> {
        let Some(backend) = self.backend() else {
            warn!(op = %op, key = %key, "Cache not available");
            self.metrics.record_unavailable();
            return OpOutcome::Unavailable;
        };

        let result = async {
            let command = SetCommand::new(op, key).args(args?);
            debug!(command = %command, backend = backend.name(), "Executing set command");
            let raw = backend.execute(&command).await?;
            decode(reply::normalize(op.reply_policy(), raw)?)
        }
        .await;

        match result {
            Ok(value) => {
                self.metrics.record_success();
                OpOutcome::Success(value)
            }
            Err(e) => {
                error!(op = %op, key = %key, error = %e, "Set operation failed");
                self.metrics.record_failure();
                OpOutcome::Failed(e)
            }
        }
    }

    /// Add members to the set at `key`, creating it if needed
    ///
    /// Returns how many members were newly added.
    pub async fn add_members<V: Serialize>(&self, key: &str, members: &[V]) -> OpOutcome<u64> {
        self.guarded(
            SetOp::AddMembers,
            key,
            encode_members(members),
            reply::into_count,
        )
        .await
    }

    /// Number of members at `key`, `0` when the key does not exist
    pub async fn cardinality(&self, key: &str) -> OpOutcome<u64> {
        self.guarded(SetOp::Cardinality, key, Ok(Vec::new()), reply::into_count)
            .await
    }

    pub async fn is_member<V: Serialize + ?Sized>(&self, key: &str, member: &V) -> OpOutcome<bool> {
        let args = encode_member(member).map(|m| vec![m]);
        self.guarded(SetOp::IsMember, key, args, reply::into_flag)
            .await
    }

    /// Every member at `key`, as stored
    pub async fn all_members(&self, key: &str) -> OpOutcome<Vec<String>> {
        self.guarded(SetOp::AllMembers, key, Ok(Vec::new()), reply::into_members)
            .await
    }

    /// Remove and return random members
    ///
    /// Without a count at most one member is popped. The key is deleted
    /// once its set is empty.
    pub async fn pop_random(&self, key: &str, count: Option<usize>) -> OpOutcome<Vec<Value>> {
        let args = count.map(|c| c.to_string()).into_iter().collect();
        self.guarded(SetOp::PopRandom, key, Ok(args), reply::into_values)
            .await
    }

    /// Remove members; returns how many were present
    pub async fn remove_members<V: Serialize>(&self, key: &str, members: &[V]) -> OpOutcome<u64> {
        self.guarded(
            SetOp::RemoveMembers,
            key,
            encode_members(members),
            reply::into_count,
        )
        .await
    }

    /// One step of a cursor scan; start with cursor `0`
    pub async fn scan(&self, key: &str, cursor: u64, options: &ScanOptions) -> OpOutcome<ScanPage> {
        self.guarded(
            SetOp::ScanCursor,
            key,
            Ok(options.to_args(cursor)),
            reply::into_scan_page,
        )
        .await
    }

    /// Scan a full pass, from cursor `0` until the store returns `0` again
    ///
    /// Members seen more than once during the pass are reported once.
    pub async fn scan_all(&self, key: &str, options: &ScanOptions) -> OpOutcome<Vec<String>> {
        let mut cursor = 0;
        let mut seen = HashSet::new();
        let mut members = Vec::new();

        loop {
            let page = match self.scan(key, cursor, options).await {
                OpOutcome::Success(page) => page,
                OpOutcome::Unavailable => return OpOutcome::Unavailable,
                OpOutcome::Failed(e) => return OpOutcome::Failed(e),
            };

            for member in page.members {
                if seen.insert(member.clone()) {
                    members.push(member);
                }
            }

            if page.cursor == 0 {
                return OpOutcome::Success(members);
            }
            cursor = page.cursor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryConnector, InMemorySetBackend};
    use crate::reply::RawReply;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    fn connected_cache() -> (SetCache, InMemorySetBackend) {
        let backend = InMemorySetBackend::new();
        let cache = SetCache::with_connector(
            CacheConfig::new("localhost:6379"),
            InMemoryConnector::new(backend.clone()),
        );
        cache.install(Arc::new(backend.clone()));
        (cache, backend)
    }

    struct SlowConnector;

    #[async_trait]
    impl BackendConnector for SlowConnector {
        async fn connect(
            &self,
            _endpoint: &Endpoint,
            _config: &CacheConfig,
        ) -> CacheResult<Arc<dyn SetBackend>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Arc::new(InMemorySetBackend::new()))
        }
    }

    /// Backend that answers every command with a fixed reply
    struct FixedReply(RawReply);

    #[async_trait]
    impl SetBackend for FixedReply {
        async fn execute(&self, _command: &SetCommand) -> CacheResult<RawReply> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_operations_unavailable_before_connect() {
        let cache = SetCache::with_connector(
            CacheConfig::new("localhost:6379"),
            InMemoryConnector::default(),
        );
        assert!(!cache.is_connected());
        assert!(cache.add_members("k", &[1]).await.is_unavailable());
        assert!(cache.cardinality("k").await.is_unavailable());
        assert!(cache.is_member("k", &1).await.is_unavailable());
        assert!(cache.all_members("k").await.is_unavailable());
        assert!(cache.pop_random("k", None).await.is_unavailable());
        assert!(cache.remove_members("k", &[1]).await.is_unavailable());
        assert!(
            cache
                .scan("k", 0, &ScanOptions::default())
                .await
                .is_unavailable()
        );
        assert_eq!(cache.health().metrics.unavailable, 7);
    }

    #[tokio::test]
    async fn test_connect_installs_handle() {
        let cache = SetCache::with_connector(
            CacheConfig::new("cache.local:6379"),
            InMemoryConnector::default(),
        );
        cache.connect().await;

        let health = cache.health();
        assert!(health.connected);
        assert_eq!(health.backend, Some("in-memory"));
        assert_eq!(health.endpoint.as_deref(), Some("cache.local:6379"));
        assert!(health.last_connect_error.is_none());
    }

    #[tokio::test]
    async fn test_connect_with_malformed_endpoint_stays_disconnected() {
        let cache = SetCache::with_connector(
            CacheConfig::new("localhost"),
            InMemoryConnector::default(),
        );
        cache.connect().await;

        assert!(!cache.is_connected());
        let error = cache.health().last_connect_error.unwrap();
        assert!(error.contains("Malformed endpoint"));
    }

    #[tokio::test]
    async fn test_connect_refused_stays_disconnected() {
        let cache = SetCache::with_connector(
            CacheConfig::new("localhost:6379"),
            InMemoryConnector::unreachable("connection refused"),
        );
        cache.connect().await;
        assert!(!cache.is_connected());
        assert!(cache.cardinality("k").await.is_unavailable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_times_out() {
        let cache = SetCache::with_connector(
            CacheConfig::new("localhost:6379").with_connect_timeout(Duration::from_millis(5000)),
            SlowConnector,
        );
        cache.connect().await;

        assert!(!cache.is_connected());
        let error = cache.health().last_connect_error.unwrap();
        assert!(error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_existing_handle() {
        let cache = SetCache::with_connector(
            CacheConfig::new("localhost:6379"),
            InMemoryConnector::default(),
        );
        cache.connect().await;
        cache.connect_to("not-an-endpoint").await;

        assert!(cache.is_connected());
        assert!(cache.health().last_connect_error.is_some());
    }

    #[tokio::test]
    async fn test_add_and_cardinality() {
        let (cache, _) = connected_cache();
        let values = [1, 3, 5, 7, 9, 4, 5, 1, 32, 32, 434, 243];
        assert_eq!(cache.add_members("numbers", &values).await.ok(), Some(9));
        assert_eq!(cache.cardinality("numbers").await.ok(), Some(9));
        assert_eq!(cache.cardinality("missing").await.ok(), Some(0));
    }

    #[tokio::test]
    async fn test_membership_uses_encoded_members() {
        let (cache, _) = connected_cache();
        let _ = cache.add_members("names", &["alice", "bob"]).await;

        assert_eq!(cache.is_member("names", "alice").await.ok(), Some(true));
        assert_eq!(cache.is_member("names", "carol").await.ok(), Some(false));
        assert_eq!(
            cache.all_members("names").await.ok(),
            Some(vec!["\"alice\"".to_string(), "\"bob\"".to_string()])
        );
    }

    #[tokio::test]
    async fn test_pop_parses_members() {
        let (cache, backend) = connected_cache();
        let _ = cache.add_members("k", &[json!({"id": 1})]).await;

        let popped = cache.pop_random("k", None).await;
        assert_eq!(popped, OpOutcome::Success(vec![json!({"id": 1})]));
        assert!(!backend.contains_key("k"));
        assert_eq!(cache.pop_random("k", Some(3)).await.ok(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_pop_fails_on_non_json_member() {
        let (cache, backend) = connected_cache();
        let add = SetCommand::new(SetOp::AddMembers, "raw").arg("plain text");
        backend.execute(&add).await.unwrap();

        let popped = cache.pop_random("raw", None).await;
        assert!(matches!(popped, OpOutcome::Failed(CacheError::Decode(_))));
    }

    #[tokio::test]
    async fn test_backend_failure_is_contained() {
        let (cache, backend) = connected_cache();
        backend.fail_with("ERR something broke");

        let outcome = cache.cardinality("k").await;
        assert!(outcome.is_failed());
        assert!(outcome.error().unwrap().to_string().contains("something broke"));
        assert_eq!(cache.health().metrics.failed, 1);
    }

    #[tokio::test]
    async fn test_unexpected_reply_shape_is_contained() {
        let cache = SetCache::with_connector(
            CacheConfig::new("localhost:6379"),
            InMemoryConnector::default(),
        );
        cache.install(Arc::new(FixedReply(RawReply::Bulk("not a count".into()))));

        assert!(cache.cardinality("k").await.is_failed());
        assert!(cache.all_members("k").await.is_failed());
        assert!(
            cache
                .scan("k", 0, &ScanOptions::default())
                .await
                .is_failed()
        );
    }

    #[tokio::test]
    async fn test_scan_all_covers_every_member() {
        let (cache, _) = connected_cache();
        let values: Vec<u32> = (0..57).collect();
        let _ = cache.add_members("big", &values).await;

        let members = cache
            .scan_all("big", &ScanOptions::default().with_count(8))
            .await
            .ok()
            .unwrap();
        assert_eq!(members.len(), 57);
    }

    #[tokio::test]
    async fn test_remove_last_member() {
        let (cache, _) = connected_cache();
        let _ = cache.add_members("single", &[42]).await;

        assert_eq!(cache.remove_members("single", &[42]).await.ok(), Some(1));
        assert_eq!(cache.cardinality("single").await.ok(), Some(0));
        assert_eq!(cache.is_member("single", &42).await.ok(), Some(false));
    }
}
