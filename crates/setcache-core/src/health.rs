//! Cache health snapshot and operation counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for guarded operations
#[derive(Debug, Default)]
pub struct OperationMetrics {
    succeeded: AtomicU64,
    failed: AtomicU64,
    unavailable: AtomicU64,
}

impl OperationMetrics {
    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`OperationMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub succeeded: u64,
    pub failed: u64,
    pub unavailable: u64,
}

impl MetricsSnapshot {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.unavailable
    }
}

/// Health status of a [`SetCache`](crate::SetCache)
#[derive(Debug, Clone)]
pub struct CacheHealth {
    /// Is a connection handle installed?
    pub connected: bool,
    /// Backend name of the installed handle
    pub backend: Option<&'static str>,
    /// Endpoint of the installed handle
    pub endpoint: Option<String>,
    /// Time since the handle was installed
    pub connected_for: Option<Duration>,
    /// Error from the most recent failed connect, if any
    pub last_connect_error: Option<String>,
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = OperationMetrics::default();
        metrics.record_success();
        metrics.record_success();
        metrics.record_failure();
        metrics.record_unavailable();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.unavailable, 1);
        assert_eq!(snapshot.total(), 4);
    }
}
