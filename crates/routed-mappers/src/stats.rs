//! Atomic routing counters.
//!
//! All atomics use `Relaxed` ordering: these are monotonic display counters
//! with no synchronization requirements.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Default)]
struct StatsInner {
    routed_calls: AtomicU64,
    materializations: AtomicU64,
    missing_context: AtomicU64,
    resolution_failures: AtomicU64,
}

/// Routing statistics shared by every handler of a proxy set. Cheap to clone (Arc).
#[derive(Clone, Default)]
pub struct RoutingStats {
    inner: Arc<StatsInner>,
}

/// Snapshot of current stats values, serializable to JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub routed_calls: u64,
    pub materializations: u64,
    pub missing_context: u64,
    pub resolution_failures: u64,
}

impl RoutingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_routed_calls(&self) {
        self.inner.routed_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_materializations(&self) {
        self.inner.materializations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_missing_context(&self) {
        self.inner.missing_context.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_resolution_failures(&self) {
        self.inner.resolution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            routed_calls: self.inner.routed_calls.load(Ordering::Relaxed),
            materializations: self.inner.materializations.load(Ordering::Relaxed),
            missing_context: self.inner.missing_context.load(Ordering::Relaxed),
            resolution_failures: self.inner.resolution_failures.load(Ordering::Relaxed),
        }
    }
}
