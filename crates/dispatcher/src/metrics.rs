//! Per-run dispatch counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the engine and its workers
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    samples_produced: AtomicU64,
    items_unrouted: AtomicU64,
    persist_failures: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    /// Count a successful task and its samples
    pub fn inc_task_completed(&self, samples: usize) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.samples_produced
            .fetch_add(samples as u64, Ordering::Relaxed);
    }

    pub fn tasks_failed(&self) -> u64 {
        self.tasks_failed.load(Ordering::Relaxed)
    }

    pub fn inc_task_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn samples_produced(&self) -> u64 {
        self.samples_produced.load(Ordering::Relaxed)
    }

    pub fn items_unrouted(&self) -> u64 {
        self.items_unrouted.load(Ordering::Relaxed)
    }

    pub fn add_items_unrouted(&self, count: usize) {
        self.items_unrouted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }

    pub fn inc_persist_failures(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_completed: self.tasks_completed(),
            tasks_failed: self.tasks_failed(),
            samples_produced: self.samples_produced(),
            items_unrouted: self.items_unrouted(),
            persist_failures: self.persist_failures(),
        }
    }
}

/// Snapshot of dispatch counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub samples_produced: u64,
    pub items_unrouted: u64,
    pub persist_failures: u64,
}
