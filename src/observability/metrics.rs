//! Routing and execution counters
//!
//! Counters only, monotonic, reset on process start.

use std::sync::atomic::{AtomicU64, Ordering};

/// Registry of operational counters.
///
/// Relaxed ordering throughout; values are exact once all writers are done.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    splits: AtomicU64,
    split_failures: AtomicU64,
    fragments_created: AtomicU64,
    tasks_executed: AtomicU64,
    tasks_failed: AtomicU64,
    rows_written: AtomicU64,
    rows_read: AtomicU64,
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub splits: u64,
    pub split_failures: u64,
    pub fragments_created: u64,
    pub tasks_executed: u64,
    pub tasks_failed: u64,
    pub rows_written: u64,
    pub rows_read: u64,
}

impl MetricsRegistry {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_splits(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_split_failures(&self) {
        self.split_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_fragments_created(&self) {
        self.fragments_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_executed(&self) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tasks_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_written(&self, rows: u64) {
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn add_rows_read(&self, rows: u64) {
        self.rows_read.fetch_add(rows, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            splits: self.splits.load(Ordering::Relaxed),
            split_failures: self.split_failures.load(Ordering::Relaxed),
            fragments_created: self.fragments_created.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_read: self.rows_read.load(Ordering::Relaxed),
        }
    }
}
