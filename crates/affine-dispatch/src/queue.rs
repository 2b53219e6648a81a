use crate::task::Task;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// An entry in the task queue.
pub(crate) enum Entry {
    Task(Task),
    /// Tells the worker loop to terminate.
    Shutdown,
}

struct QueueState {
    entries: VecDeque<Entry>,
    /// Set together with pushing the shutdown marker; no entry is accepted after it.
    closed: bool,
}

/// FIFO of pending entries shared by every caller thread and the worker.
///
/// Every access to the entries happens under `state`; `wake` is notified on
/// each successful push while the lock is still held, so the worker can never
/// observe an empty queue and then miss the notification for a later push.
pub(crate) struct TaskQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                closed: false,
            }),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a task. Hands the task back if the queue is already closed.
    pub(crate) fn push(&self, task: Task) -> Result<(), Task> {
        let mut state = self.lock();
        if state.closed {
            return Err(task);
        }
        state.entries.push_back(Entry::Task(task));
        self.wake.notify_one();
        Ok(())
    }

    /// Appends the shutdown marker and closes the queue to further pushes.
    ///
    /// Returns `false` if the queue was already closed.
    pub(crate) fn close(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.closed = true;
        state.entries.push_back(Entry::Shutdown);
        self.wake.notify_one();
        true
    }

    /// Pops the front entry without waiting.
    pub(crate) fn try_pop(&self) -> Option<Entry> {
        self.lock().entries.pop_front()
    }

    /// Waits until at least one entry is queued.
    ///
    /// Emptiness is re-checked under the lock before every wait, so a push
    /// that happened after the caller's last `try_pop` is never missed.
    pub(crate) fn wait_for_entry(&self) {
        let mut state = self.lock();
        while state.entries.is_empty() {
            state = self.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Removes every remaining task, in queue order.
    pub(crate) fn drain(&self) -> Vec<Task> {
        let mut state = self.lock();
        let tasks = state
            .entries
            .drain(..)
            .filter_map(|entry| match entry {
                Entry::Task(task) => Some(task),
                Entry::Shutdown => None,
            })
            .collect();
        tasks
    }

    /// Number of tasks waiting to run (the shutdown marker is not counted).
    pub(crate) fn len(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| matches!(entry, Entry::Task(_)))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}
