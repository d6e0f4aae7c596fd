//! Engine counters
//!
//! - Counters only, monotonic
//! - Thread-safe via relaxed atomics

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters shared by all passes of one engine
#[derive(Debug, Default)]
pub struct EngineMetrics {
    trees_classified: AtomicU64,
    nodes_classified: AtomicU64,
    unregistered_shapes: AtomicU64,
    inconsistencies: AtomicU64,
    decompositions: AtomicU64,
    full_pushdowns: AtomicU64,
    deferred_operations: AtomicU64,
    captured_projections: AtomicU64,
    captured_slots: AtomicU64,
    rows_evaluated: AtomicU64,
    upstream_failures: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Classification

    pub fn record_classification(&self, nodes: u64, unregistered: u64) {
        self.trees_classified.fetch_add(1, Ordering::Relaxed);
        self.nodes_classified.fetch_add(nodes, Ordering::Relaxed);
        self.unregistered_shapes
            .fetch_add(unregistered, Ordering::Relaxed);
    }

    pub fn increment_inconsistencies(&self) {
        self.inconsistencies.fetch_add(1, Ordering::Relaxed);
    }

    // Decomposition

    /// `slots` is the number of slots of the captured projection, if any
    pub fn record_decomposition(&self, deferred_ops: u64, slots: u64) {
        self.decompositions.fetch_add(1, Ordering::Relaxed);
        if deferred_ops == 0 {
            self.full_pushdowns.fetch_add(1, Ordering::Relaxed);
        }
        self.deferred_operations
            .fetch_add(deferred_ops, Ordering::Relaxed);
        if slots > 0 {
            self.captured_projections.fetch_add(1, Ordering::Relaxed);
            self.captured_slots.fetch_add(slots, Ordering::Relaxed);
        }
    }

    // Evaluation

    pub fn increment_rows_evaluated(&self) {
        self.rows_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_upstream_failures(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            trees_classified: self.trees_classified.load(Ordering::Relaxed),
            nodes_classified: self.nodes_classified.load(Ordering::Relaxed),
            unregistered_shapes: self.unregistered_shapes.load(Ordering::Relaxed),
            inconsistencies: self.inconsistencies.load(Ordering::Relaxed),
            decompositions: self.decompositions.load(Ordering::Relaxed),
            full_pushdowns: self.full_pushdowns.load(Ordering::Relaxed),
            deferred_operations: self.deferred_operations.load(Ordering::Relaxed),
            captured_projections: self.captured_projections.load(Ordering::Relaxed),
            captured_slots: self.captured_slots.load(Ordering::Relaxed),
            rows_evaluated: self.rows_evaluated.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub trees_classified: u64,
    pub nodes_classified: u64,
    pub unregistered_shapes: u64,
    pub inconsistencies: u64,
    pub decompositions: u64,
    pub full_pushdowns: u64,
    pub deferred_operations: u64,
    pub captured_projections: u64,
    pub captured_slots: u64,
    pub rows_evaluated: u64,
    pub upstream_failures: u64,
}
