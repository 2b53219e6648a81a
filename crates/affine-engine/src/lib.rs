//! Affine Engine
//!
//! A Boa JavaScript engine hosted on an [`affine_dispatch::Dispatcher`].
//!
//! Boa's `Context` is neither `Send` nor `Sync`. [`ScriptEngine`] creates its
//! context on the dispatcher's worker thread, keeps it there, and routes every
//! operation through the dispatcher, so the engine can be shared freely
//! between threads (for example behind an `Arc`) while the context itself
//! never leaves its thread.
//!
//! # Example
//!
//! ```no_run
//! use affine_engine::ScriptEngine;
//! use serde_json::json;
//!
//! let engine = ScriptEngine::new()?;
//! engine.execute("function add(a, b) { return a + b; }")?;
//!
//! let sum = engine.call_function("add", vec![json!(2), json!(3)])?;
//! assert_eq!(sum, json!(5));
//! # Ok::<(), affine_engine::EngineError>(())
//! ```

pub mod error;
pub mod runtime;

pub use error::{EngineError, Result};
pub use runtime::{recursion_limit_for, ScriptEngine, DEFAULT_ENGINE_THREAD_NAME};
