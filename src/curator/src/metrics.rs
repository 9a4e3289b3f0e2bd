//! Thread-safe counters for cleanup cycle monitoring.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe metrics for tracking cleanup cycles.
#[derive(Debug, Clone)]
pub struct CuratorMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    /// Number of completed cleanup cycles
    cycles_completed: AtomicUsize,
    /// Total number of index names evaluated
    indices_evaluated: AtomicUsize,
    /// Total number of indices matched by a policy
    indices_matched: AtomicUsize,
    /// Total number of indices closed (or that would close in dry-run)
    indices_closed: AtomicUsize,
    /// Total number of indices deleted (or that would delete in dry-run)
    indices_deleted: AtomicUsize,
    /// Total number of failed cluster operations
    transport_errors: AtomicUsize,
}

impl Default for CuratorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CuratorMetrics {
    /// Create a new metrics tracker
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                cycles_completed: AtomicUsize::new(0),
                indices_evaluated: AtomicUsize::new(0),
                indices_matched: AtomicUsize::new(0),
                indices_closed: AtomicUsize::new(0),
                indices_deleted: AtomicUsize::new(0),
                transport_errors: AtomicUsize::new(0),
            }),
        }
    }

    pub fn record_cycle_completed(&self) {
        self.inner.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indices_evaluated(&self, count: usize) {
        self.inner
            .indices_evaluated
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_index_matched(&self) {
        self.inner.indices_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_closed(&self) {
        self.inner.indices_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_deleted(&self) {
        self.inner.indices_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.inner.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles_completed(&self) -> usize {
        self.inner.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn indices_evaluated(&self) -> usize {
        self.inner.indices_evaluated.load(Ordering::Relaxed)
    }

    pub fn indices_matched(&self) -> usize {
        self.inner.indices_matched.load(Ordering::Relaxed)
    }

    pub fn indices_closed(&self) -> usize {
        self.inner.indices_closed.load(Ordering::Relaxed)
    }

    pub fn indices_deleted(&self) -> usize {
        self.inner.indices_deleted.load(Ordering::Relaxed)
    }

    pub fn transport_errors(&self) -> usize {
        self.inner.transport_errors.load(Ordering::Relaxed)
    }
}
