//! Affine Dispatch
//!
//! A single-thread dispatcher for script engines with strict thread affinity.
//!
//! # Overview
//!
//! Engines such as Boa, QuickJS or COM-hosted script engines must only ever be
//! called from the thread that created them, and can recurse deeply enough to
//! overflow a default thread stack. A [`Dispatcher`] owns one dedicated worker
//! thread with an enlarged stack and lets any number of caller threads run
//! closures on it:
//!
//! - **Single thread**: every delegate runs on the same worker thread
//! - **Ordered**: delegates run one at a time, in submission order
//! - **Blocking**: [`Dispatcher::invoke`] returns the delegate's value once it
//!   has run; [`Dispatcher::invoke_async`] does the same for async callers
//! - **Transparent failures**: typed delegate errors come back unchanged and
//!   delegate panics are resumed on the caller's thread
//!
//! # Example
//!
//! ```
//! use affine_dispatch::Dispatcher;
//!
//! let dispatcher = Dispatcher::new()?;
//! let answer = dispatcher.invoke(|| 6 * 7)?;
//! assert_eq!(answer, 42);
//!
//! dispatcher.dispose();
//! assert!(dispatcher.invoke(|| 1).is_err());
//! # Ok::<(), affine_dispatch::DispatchError>(())
//! ```
//!
//! # Reentrancy
//!
//! A delegate must never call `invoke` on the dispatcher running it: the nested
//! call waits for a worker that is busy waiting for it, and both hang.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod stats;

mod latch;
mod queue;
mod task;
mod worker;

pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result};
pub use stats::StatsSnapshot;
