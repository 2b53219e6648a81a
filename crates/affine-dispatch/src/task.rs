//! Units of work submitted to the worker thread.
//!
//! A [`Task`] owns a type-erased delegate together with the sink that
//! receives its [`Outcome`]. The sink is called exactly once: with the
//! delegate's value or panic payload when the task runs, or with
//! [`Outcome::Cancelled`] when the task is discarded. Dropping a task that
//! never ran counts as discarding it, so no submitter is ever left waiting on
//! a task that silently disappeared.

use crate::error::{DispatchError, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Payload of a panic caught on the worker thread.
pub(crate) type PanicPayload = Box<dyn Any + Send + 'static>;

/// Tagged result of a task, handed from the worker back to the submitter.
pub(crate) enum Outcome<T> {
    /// The delegate returned normally.
    Value(T),
    /// The delegate panicked; the payload is resumed on the submitting thread.
    Panicked(PanicPayload),
    /// The task was discarded during shutdown and never ran.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Unpacks the outcome on the submitting thread.
    ///
    /// A delegate panic is resumed here with its original payload, as if the
    /// delegate had run in place.
    pub(crate) fn into_result(self) -> Result<T> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Panicked(payload) => panic::resume_unwind(payload),
            Outcome::Cancelled => Err(DispatchError::Cancelled),
        }
    }
}

/// What happened to a task, as seen by the worker (used for statistics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskStatus {
    Completed,
    Panicked,
    Cancelled,
}

enum Fate {
    Execute,
    Discard,
}

type Job = Box<dyn FnOnce(Fate) -> TaskStatus + Send + 'static>;

/// A unit of work: delegate plus completion sink. Runs at most once.
pub(crate) struct Task {
    job: Option<Job>,
}

impl Task {
    /// Wraps `delegate`, delivering its outcome to `sink`.
    pub(crate) fn new<F, T, S>(delegate: F, sink: S) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        S: FnOnce(Outcome<T>) + Send + 'static,
    {
        let job: Job = Box::new(move |fate| {
            let outcome = match fate {
                Fate::Execute => match panic::catch_unwind(AssertUnwindSafe(delegate)) {
                    Ok(value) => Outcome::Value(value),
                    Err(payload) => Outcome::Panicked(payload),
                },
                Fate::Discard => Outcome::Cancelled,
            };

            let status = match &outcome {
                Outcome::Value(_) => TaskStatus::Completed,
                Outcome::Panicked(_) => TaskStatus::Panicked,
                Outcome::Cancelled => TaskStatus::Cancelled,
            };

            sink(outcome);
            status
        });

        Self { job: Some(job) }
    }

    /// Creates a task whose submitter blocks on a [`Completion`].
    pub(crate) fn blocking<F, T>(delegate: F) -> (Self, Arc<Completion<T>>)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let completion = Arc::new(Completion::new());
        let signal = Arc::clone(&completion);
        let task = Self::new(delegate, move |outcome| signal.complete(outcome));
        (task, completion)
    }

    /// Runs the delegate on the current thread and signals completion.
    ///
    /// Panics inside the delegate are captured into the outcome; this never
    /// unwinds into the caller.
    pub(crate) fn execute(mut self) -> TaskStatus {
        match self.job.take() {
            Some(job) => job(Fate::Execute),
            None => TaskStatus::Cancelled,
        }
    }

    /// Completes the task with [`Outcome::Cancelled`] without running it.
    pub(crate) fn discard(mut self) -> TaskStatus {
        match self.job.take() {
            Some(job) => job(Fate::Discard),
            None => TaskStatus::Cancelled,
        }
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job(Fate::Discard);
        }
    }
}

/// Single-use completion signal with a write-once outcome slot.
pub(crate) struct Completion<T> {
    slot: Mutex<Option<Outcome<T>>>,
    signal: Condvar,
}

impl<T> Completion<T> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            signal: Condvar::new(),
        }
    }

    fn complete(&self, outcome: Outcome<T>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(slot.is_none(), "task completed twice");
        *slot = Some(outcome);
        self.signal.notify_all();
    }

    /// Blocks until the outcome is available and takes it.
    pub(crate) fn wait(&self) -> Outcome<T> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            slot = self.signal.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}
