use crate::config::DispatcherConfig;
use crate::error::{DispatchError, Result};
use crate::latch::DisposalLatch;
use crate::queue::TaskQueue;
use crate::stats::{DispatcherStats, StatsSnapshot};
use crate::task::Task;
use crate::worker::WorkerLoop;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::oneshot;

/// Runs delegates, one at a time and in submission order, on a single
/// dedicated thread.
///
/// Engines that may only be touched from one thread are driven entirely
/// through a `Dispatcher`: every call submitted with [`invoke`](Self::invoke)
/// executes on the same physical worker thread for the dispatcher's whole
/// lifetime, and that thread has an enlarged stack (see
/// [`DispatcherConfig::stack_size`]).
///
/// # Reentrancy
///
/// A delegate must never call `invoke` on the dispatcher that is running it.
/// The nested task would queue behind the task that is waiting for it, and
/// both would block forever. Use [`is_worker_thread`](Self::is_worker_thread)
/// to run code directly when already on the worker.
///
/// # Shutdown
///
/// [`dispose`](Self::dispose) stops the worker and joins it. The same path runs
/// from `Drop` if the dispatcher was never disposed explicitly.
pub struct Dispatcher {
    queue: Arc<TaskQueue>,
    stats: Arc<DispatcherStats>,
    latch: DisposalLatch,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Creates a dispatcher with the default configuration and starts its
    /// worker thread.
    pub fn new() -> Result<Self> {
        Self::with_config(DispatcherConfig::default())
    }

    /// Creates a dispatcher with a custom configuration and starts its worker
    /// thread.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::InvalidConfig`] if `config` fails validation
    /// - [`DispatchError::Spawn`] if the OS refuses to create the thread
    pub fn with_config(config: DispatcherConfig) -> Result<Self> {
        config.validate().map_err(DispatchError::InvalidConfig)?;

        let queue = Arc::new(TaskQueue::new());
        let stats = Arc::new(DispatcherStats::new());
        let worker = WorkerLoop::new(Arc::clone(&queue), Arc::clone(&stats));

        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .stack_size(config.stack_size)
            .spawn(move || worker.run())?;
        let worker_id = handle.thread().id();

        tracing::debug!(
            thread = %config.thread_name,
            stack_size = config.stack_size,
            "Dispatcher started"
        );

        Ok(Self {
            queue,
            stats,
            latch: DisposalLatch::new(),
            worker: Mutex::new(Some(handle)),
            worker_id,
            config,
        })
    }

    /// Runs `delegate` on the worker thread and blocks until it has finished.
    ///
    /// Calls from concurrent threads execute in the order they were queued.
    /// If the delegate panics, the panic is resumed on the calling thread with
    /// its original payload; the worker itself keeps running.
    ///
    /// A delegate returning `()` covers the no-value form of the call.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Disposed`] if shutdown has begun; the delegate is
    ///   dropped without running
    /// - [`DispatchError::Cancelled`] if the task was discarded during shutdown
    pub fn invoke<F, T>(&self, delegate: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, completion) = Task::blocking(delegate);
        self.submit(task)?;
        completion.wait().into_result()
    }

    /// Like [`invoke`](Self::invoke), for delegates that return a `Result`.
    ///
    /// The delegate's own error is returned unchanged; dispatcher errors are
    /// converted into `E`.
    pub fn try_invoke<F, T, E>(&self, delegate: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DispatchError> + Send + 'static,
    {
        self.invoke(delegate)?
    }

    /// Queues `delegate` and returns a future that resolves with its result.
    ///
    /// The task takes its place in the queue when this method is called, not
    /// when the future is first polled. Dropping the future does not withdraw
    /// the task; its result is discarded.
    pub fn invoke_async<F, T>(
        &self,
        delegate: F,
    ) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let submitted = self.submit(Task::new(delegate, move |outcome| {
            let _ = tx.send(outcome);
        }));

        async move {
            submitted?;
            match rx.await {
                Ok(outcome) => outcome.into_result(),
                Err(_) => Err(DispatchError::Cancelled),
            }
        }
    }

    fn submit(&self, task: Task) -> Result<()> {
        if self.latch.is_set() {
            self.stats.record_rejected();
            return Err(DispatchError::Disposed);
        }

        match self.queue.push(task) {
            Ok(()) => {
                self.stats.record_submitted();
                Ok(())
            }
            Err(_rejected) => {
                // Lost the race with dispose(): the queue closed between the
                // latch check and the push.
                self.stats.record_rejected();
                Err(DispatchError::Disposed)
            }
        }
    }

    /// Shuts the dispatcher down.
    ///
    /// The first call closes the queue behind a shutdown marker, waits for the
    /// worker to run every task queued ahead of the marker and exit, then
    /// cancels anything still left in the queue. It returns `true`. Every other
    /// call, concurrent or later, returns `false` immediately.
    ///
    /// When called on the worker thread itself (for example when the last
    /// owner is dropped inside a delegate) the worker cannot be joined; it is
    /// detached and exits once it reaches the marker.
    pub fn dispose(&self) -> bool {
        if !self.latch.try_set() {
            return false;
        }

        self.queue.close();

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if self.is_worker_thread() {
                tracing::warn!("Dispatcher disposed from its own worker thread, detaching worker");
                return true;
            }

            if handle.join().is_err() {
                tracing::error!("Dispatcher worker thread panicked");
            }
        }

        // Empty whenever the worker reached the marker; tasks are only left
        // behind if the worker thread died outside a task.
        let abandoned = self.queue.drain();
        if !abandoned.is_empty() {
            tracing::warn!(count = abandoned.len(), "Cancelling tasks left in queue at shutdown");
            for task in abandoned {
                self.stats.record(task.discard());
            }
        }

        tracing::debug!(thread = %self.config.thread_name, "Dispatcher disposed");
        true
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.latch.is_set()
    }

    /// Id of the worker thread that runs every delegate.
    pub fn worker_thread_id(&self) -> ThreadId {
        self.worker_id
    }

    /// Returns `true` when called from the worker thread, i.e. from inside a
    /// delegate.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Number of tasks waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.queue.len(), self.is_disposed())
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("thread_name", &self.config.thread_name)
            .field("worker_id", &self.worker_id)
            .field("disposed", &self.is_disposed())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_invoke_returns_value() {
        let dispatcher = Dispatcher::new().unwrap();
        assert_eq!(dispatcher.invoke(|| 42).unwrap(), 42);
        assert_eq!(dispatcher.invoke(|| "abc").unwrap(), "abc");
    }

    #[test]
    fn test_invoke_unit_delegate() {
        let dispatcher = Dispatcher::new().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        dispatcher.invoke(move || flag.store(true, Ordering::SeqCst)).unwrap();

        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_delegates_run_on_worker_thread() {
        let dispatcher = Dispatcher::new().unwrap();
        let first = dispatcher.invoke(|| thread::current().id()).unwrap();
        let second = dispatcher.invoke(|| thread::current().id()).unwrap();

        assert_eq!(first, dispatcher.worker_thread_id());
        assert_eq!(second, dispatcher.worker_thread_id());
        assert_ne!(first, thread::current().id());
        assert!(!dispatcher.is_worker_thread());
    }

    #[test]
    fn test_worker_thread_uses_configured_name() {
        let config = DispatcherConfig::new().with_thread_name("script-engine");
        let dispatcher = Dispatcher::with_config(config).unwrap();

        let name = dispatcher
            .invoke(|| thread::current().name().map(str::to_string))
            .unwrap();

        assert_eq!(name.as_deref(), Some("script-engine"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = DispatcherConfig::new().with_stack_size(1024);
        let err = Dispatcher::with_config(config).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidConfig(_)));
    }

    #[test]
    fn test_dispose_then_invoke_fails() {
        let dispatcher = Dispatcher::new().unwrap();
        assert!(dispatcher.dispose());
        assert!(dispatcher.is_disposed());

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let result = dispatcher.invoke(move || flag.store(true, Ordering::SeqCst));

        assert!(matches!(result, Err(DispatchError::Disposed)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_second_dispose_returns_false() {
        let dispatcher = Dispatcher::new().unwrap();
        assert!(dispatcher.dispose());
        assert!(!dispatcher.dispose());
    }

    #[test]
    fn test_stats_track_calls() {
        let dispatcher = Dispatcher::new().unwrap();
        dispatcher.invoke(|| ()).unwrap();
        dispatcher.invoke(|| ()).unwrap();
        dispatcher.dispose();
        let _ = dispatcher.invoke(|| ());

        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.queue_depth, 0);
        assert!(stats.disposed);
    }

    #[test]
    fn test_dispose_from_worker_thread_detaches() {
        let dispatcher = Arc::new(Dispatcher::new().unwrap());
        let inner = Arc::clone(&dispatcher);
        let (tx, rx) = mpsc::channel();

        dispatcher
            .invoke(move || {
                let _ = tx.send(inner.dispose());
            })
            .unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
        assert!(dispatcher.is_disposed());
        assert!(matches!(dispatcher.invoke(|| 1), Err(DispatchError::Disposed)));
    }

    #[test]
    fn test_drop_runs_queued_work_and_joins() {
        let dispatcher = Dispatcher::new().unwrap();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let pending = dispatcher.invoke_async(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::SeqCst);
        });

        // Drop joins the worker, which first drains the task queued ahead of
        // the shutdown marker.
        drop(dispatcher);
        drop(pending);
        assert!(finished.load(Ordering::SeqCst));
    }

    /// A dispatcher whose worker thread has already exited without ever
    /// draining the queue.
    fn dispatcher_with_dead_worker() -> Dispatcher {
        let handle = thread::spawn(|| {});
        let worker_id = handle.thread().id();

        Dispatcher {
            queue: Arc::new(TaskQueue::new()),
            stats: Arc::new(DispatcherStats::new()),
            latch: DisposalLatch::new(),
            worker: Mutex::new(Some(handle)),
            worker_id,
            config: DispatcherConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_dispose_cancels_tasks_left_by_dead_worker() {
        let dispatcher = dispatcher_with_dead_worker();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        let pending = dispatcher.invoke_async(move || flag.store(true, Ordering::SeqCst));
        assert_eq!(dispatcher.pending(), 1);

        assert!(dispatcher.dispose());

        assert!(matches!(pending.await, Err(DispatchError::Cancelled)));
        assert!(!ran.load(Ordering::SeqCst));

        let stats = dispatcher.stats();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.queue_depth, 0);
    }

    #[test]
    fn test_blocking_caller_is_released_when_dead_worker_is_disposed() {
        let dispatcher = Arc::new(dispatcher_with_dead_worker());
        let caller = {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || dispatcher.invoke(|| 1))
        };

        while dispatcher.pending() == 0 {
            thread::yield_now();
        }
        assert!(dispatcher.dispose());

        assert!(matches!(caller.join().unwrap(), Err(DispatchError::Cancelled)));
    }

    #[test]
    fn test_debug_output() {
        let dispatcher = Dispatcher::new().unwrap();
        let debug = format!("{:?}", dispatcher);
        assert!(debug.contains("affine-dispatcher"));
        assert!(debug.contains("disposed: false"));
    }
}
