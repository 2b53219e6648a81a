//! Body of the dedicated worker thread.
//!
//! ```text
//!             wake                     marker
//! IdleWaiting ────► Draining ───────────────────► Terminated
//!      ▲              │  ▲
//!      └── empty ─────┘  │ completion signalled
//!                     task│
//!                        ▼│
//!                     Executing
//! ```
//!
//! After each task the loop goes back to `Draining` instead of waiting, so
//! tasks pushed while a delegate was running are picked up without needing a
//! fresh notification.

use crate::queue::{Entry, TaskQueue};
use crate::stats::DispatcherStats;
use crate::task::Task;
use std::sync::Arc;

pub(crate) enum WorkerState {
    IdleWaiting,
    Draining,
    Executing(Task),
    Terminated,
}

pub(crate) struct WorkerLoop {
    queue: Arc<TaskQueue>,
    stats: Arc<DispatcherStats>,
}

impl WorkerLoop {
    pub(crate) fn new(queue: Arc<TaskQueue>, stats: Arc<DispatcherStats>) -> Self {
        Self { queue, stats }
    }

    /// Performs one transition of the state machine.
    pub(crate) fn step(&self, state: WorkerState) -> WorkerState {
        match state {
            WorkerState::IdleWaiting => {
                self.queue.wait_for_entry();
                WorkerState::Draining
            }
            WorkerState::Draining => match self.queue.try_pop() {
                Some(Entry::Task(task)) => WorkerState::Executing(task),
                Some(Entry::Shutdown) => WorkerState::Terminated,
                None => WorkerState::IdleWaiting,
            },
            WorkerState::Executing(task) => {
                let status = task.execute();
                tracing::trace!(?status, "Task finished");
                self.stats.record(status);
                WorkerState::Draining
            }
            WorkerState::Terminated => WorkerState::Terminated,
        }
    }

    /// Runs until the shutdown marker is popped.
    pub(crate) fn run(self) {
        tracing::debug!(
            thread = std::thread::current().name().unwrap_or("<unnamed>"),
            "Worker thread started"
        );

        let mut state = WorkerState::IdleWaiting;
        loop {
            state = self.step(state);
            if matches!(state, WorkerState::Terminated) {
                break;
            }
        }

        tracing::debug!("Worker received shutdown marker, terminating");
    }
}
