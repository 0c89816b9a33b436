//! Integration tests for reconnect episodes seen through `SetCache`
//!
//! A scripted failover connector stands in for Redis: its first connection
//! lands on a read-only replica, later ones on the primary. Both nodes share
//! one in-memory set store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use setcache_workspace::{
    BackendConnector, CacheConfig, CacheError, CacheResult, ConnectionStatus, Connector, Endpoint,
    InMemorySetBackend, RawReply, ReconnectPolicy, ReconnectingConnection, SetBackend, SetCache,
    SetCommand, SetOp, Transport, TransportFault,
};

/// One node of the scripted deployment
struct Node {
    store: InMemorySetBackend,
    read_only: bool,
}

#[async_trait]
impl Transport for Node {
    async fn send(&self, command: &SetCommand) -> Result<RawReply, TransportFault> {
        if self.read_only && command.op.is_write() {
            return Err(TransportFault::reply(
                "READONLY You can't write against a read only replica.",
            ));
        }
        self.store.execute(command).await.map_err(|e| match e {
            CacheError::CommandFailed { message, .. } => TransportFault::reply(message),
            other => TransportFault::other(other.to_string()),
        })
    }
}

/// Shared counters and switches for the scripted deployment
#[derive(Default)]
struct Deployment {
    store: InMemorySetBackend,
    /// Connections handed out as replicas before the primary is reachable
    replicas: AtomicU32,
    /// Connect attempts refused outright
    refusals: AtomicU32,
    connects: AtomicU32,
}

#[derive(Clone)]
struct FailoverConnector {
    deployment: Arc<Deployment>,
}

#[async_trait]
impl Connector for FailoverConnector {
    type Conn = Node;

    async fn connect(&self) -> Result<Node, TransportFault> {
        let d = &self.deployment;
        d.connects.fetch_add(1, Ordering::SeqCst);

        if d.refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportFault::dropped("Connection refused"));
        }

        let read_only = d
            .replicas
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        Ok(Node {
            store: d.store.clone(),
            read_only,
        })
    }

    fn name(&self) -> &'static str {
        "failover"
    }
}

#[async_trait]
impl BackendConnector for FailoverConnector {
    async fn connect(
        &self,
        _endpoint: &Endpoint,
        config: &CacheConfig,
    ) -> CacheResult<Arc<dyn SetBackend>> {
        let connection = ReconnectingConnection::connect(self.clone(), config.reconnect).await?;
        Ok(Arc::new(connection))
    }
}

fn deployment(replicas: u32) -> Arc<Deployment> {
    let deployment = Deployment::default();
    deployment.replicas.store(replicas, Ordering::SeqCst);
    Arc::new(deployment)
}

async fn cache_over(deployment: &Arc<Deployment>, policy: ReconnectPolicy) -> SetCache {
    let cache = SetCache::with_connector(
        CacheConfig::new("redis-primary:6379").with_reconnect_policy(policy),
        FailoverConnector {
            deployment: deployment.clone(),
        },
    );
    cache.connect().await;
    assert!(cache.is_connected());
    cache
}

#[tokio::test(start_paused = true)]
async fn test_write_on_replica_fails_over_to_primary() {
    let deployment = deployment(1);
    let cache = cache_over(&deployment, ReconnectPolicy::default()).await;

    // Reads are served by the replica
    assert_eq!(cache.cardinality("numbers").await.ok(), Some(0));
    assert_eq!(deployment.connects.load(Ordering::SeqCst), 1);

    // The write hits READONLY, reconnects and is resent to the primary
    assert_eq!(cache.add_members("numbers", &[1, 3, 5]).await.ok(), Some(3));
    assert_eq!(deployment.connects.load(Ordering::SeqCst), 2);
    assert_eq!(cache.cardinality("numbers").await.ok(), Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_failover_waits_for_the_backoff_schedule() {
    let deployment = deployment(1);
    let cache = cache_over(&deployment, ReconnectPolicy::default()).await;
    // Primary refuses the first reconnect attempt
    deployment.refusals.store(1, Ordering::SeqCst);

    let start = tokio::time::Instant::now();
    assert_eq!(cache.add_members("numbers", &[7]).await.ok(), Some(1));

    // 50ms before attempt one, 100ms before attempt two
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < Duration::from_millis(200));
    assert_eq!(deployment.connects.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_episode_fails_fast_until_reconnected() {
    let deployment = deployment(1);
    let cache = cache_over(&deployment, ReconnectPolicy::default()).await;
    deployment.refusals.store(u32::MAX, Ordering::SeqCst);

    let outcome = cache.add_members("numbers", &[1]).await;
    assert!(matches!(
        outcome.error(),
        Some(CacheError::ReconnectExhausted { attempts: 2, .. })
    ));

    // The handle stays installed but the connection is closed
    assert!(cache.is_connected());
    let connects = deployment.connects.load(Ordering::SeqCst);
    assert!(matches!(
        cache.cardinality("numbers").await.error(),
        Some(CacheError::ConnectionClosed)
    ));
    assert_eq!(deployment.connects.load(Ordering::SeqCst), connects);

    // A fresh connect replaces the closed handle
    deployment.refusals.store(0, Ordering::SeqCst);
    cache.connect().await;
    assert_eq!(cache.add_members("numbers", &[1]).await.ok(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_other_errors_are_not_retried() {
    let deployment = deployment(0);
    let cache = cache_over(&deployment, ReconnectPolicy::default()).await;
    deployment.store.fail_with("ERR simulated outage");

    let outcome = cache.cardinality("numbers").await;
    assert!(matches!(
        outcome.error(),
        Some(CacheError::CommandFailed { message, .. }) if message.starts_with("ERR")
    ));
    assert_eq!(deployment.connects.load(Ordering::SeqCst), 1);
}

fn loading_classifier(message: &str) -> bool {
    message.starts_with("LOADING")
}

#[tokio::test(start_paused = true)]
async fn test_custom_classifier_replaces_readonly_rule() {
    let deployment = deployment(1);
    let policy = ReconnectPolicy::default().with_classifier(loading_classifier);
    let cache = cache_over(&deployment, policy).await;

    // READONLY is no longer a reconnect trigger
    let outcome = cache.add_members("numbers", &[1]).await;
    assert!(outcome.is_failed());
    assert_eq!(deployment.connects.load(Ordering::SeqCst), 1);

    deployment
        .store
        .fail_with("LOADING Redis is loading the dataset in memory");
    assert!(cache.cardinality("numbers").await.is_failed());
    // One reconnect, then the resend fails again and is reported
    assert_eq!(deployment.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connection_status_through_an_episode() {
    let deployment = deployment(1);
    let connection = ReconnectingConnection::connect(
        FailoverConnector {
            deployment: deployment.clone(),
        },
        ReconnectPolicy::default(),
    )
    .await
    .unwrap();
    assert_eq!(connection.status().await, ConnectionStatus::Ready);

    let command = SetCommand::new(SetOp::AddMembers, "k").arg("1");
    assert_eq!(connection.execute(&command).await.unwrap(), RawReply::Int(1));
    assert_eq!(connection.status().await, ConnectionStatus::Ready);
    assert_eq!(connection.reconnect_count(), 1);
}
