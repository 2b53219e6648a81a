//! Lock-free counters describing what a dispatcher has done.

use crate::task::TaskStatus;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by callers (submission, rejection) and by the worker
/// (completion, panics, cancellation).
#[derive(Debug, Default)]
pub(crate) struct DispatcherStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    cancelled: AtomicU64,
    rejected: AtomicU64,
}

impl DispatcherStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record(&self, status: TaskStatus) {
        let counter = match status {
            TaskStatus::Completed => &self.completed,
            TaskStatus::Panicked => &self.panicked,
            TaskStatus::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters.
    ///
    /// The counters are read independently, so a snapshot taken while tasks
    /// are in flight may be momentarily inconsistent across fields.
    pub(crate) fn snapshot(&self, queue_depth: usize, disposed: bool) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            queue_depth,
            disposed,
        }
    }
}

/// Serializable view of a dispatcher's counters, returned by
/// [`Dispatcher::stats`](crate::Dispatcher::stats).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Tasks accepted onto the queue
    pub submitted: u64,
    /// Tasks whose delegate returned normally
    pub completed: u64,
    /// Tasks whose delegate panicked
    pub panicked: u64,
    /// Tasks discarded during shutdown without running
    pub cancelled: u64,
    /// Submissions refused because the dispatcher was disposed
    pub rejected: u64,
    /// Tasks waiting in the queue when the snapshot was taken
    pub queue_depth: usize,
    pub disposed: bool,
}

impl StatsSnapshot {
    /// Tasks that have left the queue one way or another.
    pub fn finished(&self) -> u64 {
        self.completed + self.panicked + self.cancelled
    }
}
