use affine_dispatch::{Dispatcher, DispatcherConfig, StatsSnapshot};
use boa_engine::{js_string, value::JsValue, Context, Source};
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::future::Future;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::runtime::{
    bindings,
    conversions::{js_value_to_json, json_to_js_value},
};

/// Thread name used by [`ScriptEngine::new`].
pub const DEFAULT_ENGINE_THREAD_NAME: &str = "affine-js";

/// Worker stack budgeted for each nested script call.
const STACK_BYTES_PER_CALL: usize = 4 * 1024;

/// VM value-stack slots allowed for each nested script call.
const VALUE_SLOTS_PER_CALL: usize = 64;

/// Script recursion depth allowed on a worker with `stack_size` bytes of
/// stack.
pub fn recursion_limit_for(stack_size: usize) -> usize {
    stack_size / STACK_BYTES_PER_CALL
}

/// Sizes the engine's runtime limits to the worker stack, so deeper stacks
/// allow deeper script recursion.
fn apply_stack_limits(ctx: &mut Context, stack_size: usize) {
    let recursion_limit = recursion_limit_for(stack_size);
    let limits = ctx.runtime_limits_mut();

    let value_slots = recursion_limit
        .saturating_mul(VALUE_SLOTS_PER_CALL)
        .max(limits.stack_size_limit());

    limits.set_recursion_limit(recursion_limit);
    limits.set_stack_size_limit(value_slots);
}

thread_local! {
    /// The engine context owned by the current worker thread.
    ///
    /// Every `ScriptEngine` has its own dispatcher, so each worker thread holds
    /// at most one context.
    static CONTEXT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

/// Run `f` against this thread's context.
fn with_context<T>(f: impl FnOnce(&mut Context) -> Result<T>) -> Result<T> {
    CONTEXT.with(|cell| {
        let mut slot = cell
            .try_borrow_mut()
            .map_err(|_| EngineError::ContextUnavailable)?;
        let ctx = slot.as_mut().ok_or(EngineError::ContextUnavailable)?;
        f(ctx)
    })
}

fn drop_context() {
    CONTEXT.with(|cell| {
        if let Ok(mut slot) = cell.try_borrow_mut() {
            slot.take();
        }
    });
}

fn eval_on_worker(source: &str) -> Result<JsonValue> {
    with_context(|ctx| {
        let value = ctx.eval(Source::from_bytes(source))?;
        js_value_to_json(value, ctx)
    })
}

fn call_on_worker(name: &str, args: Vec<JsonValue>) -> Result<JsonValue> {
    with_context(|ctx| {
        let global = ctx.global_object();
        let value = global.get(js_string!(name), ctx)?;

        let func = value
            .as_callable()
            .ok_or_else(|| EngineError::Script(format!("'{}' is not a function", name)))?;

        let mut js_args = Vec::with_capacity(args.len());
        for arg in args {
            js_args.push(json_to_js_value(arg, ctx)?);
        }

        let result = func.call(&JsValue::undefined(), &js_args, ctx)?;
        js_value_to_json(result, ctx)
    })
}

/// A Boa JavaScript engine pinned to one dedicated thread.
///
/// The Boa `Context` is created, used and dropped on the worker thread of the
/// engine's own [`Dispatcher`]. `ScriptEngine` itself is `Send + Sync`, so it
/// can be shared (e.g. in an `Arc`) by any number of threads; their calls are
/// serialized in submission order.
///
/// Values cross the thread boundary as `serde_json::Value`.
pub struct ScriptEngine {
    dispatcher: Dispatcher,
}

impl ScriptEngine {
    /// Start an engine on a worker named `affine-js` with the default stack.
    pub fn new() -> Result<Self> {
        Self::with_config(DispatcherConfig::new().with_thread_name(DEFAULT_ENGINE_THREAD_NAME))
    }

    /// Start an engine on a worker configured by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Dispatch`] if the configuration is invalid or the
    /// worker cannot be spawned, and [`EngineError::Script`] if the host
    /// bindings fail to install.
    pub fn with_config(config: DispatcherConfig) -> Result<Self> {
        let dispatcher = Dispatcher::with_config(config)?;
        let stack_size = dispatcher.config().stack_size;

        dispatcher.try_invoke(move || -> Result<()> {
            let mut ctx = Context::default();
            apply_stack_limits(&mut ctx, stack_size);
            bindings::install_host_bindings(&mut ctx)?;
            CONTEXT.with(|cell| *cell.borrow_mut() = Some(ctx));
            Ok(())
        })?;

        tracing::debug!(
            "Script engine started on thread '{}' (recursion limit {})",
            dispatcher.config().thread_name,
            recursion_limit_for(stack_size)
        );

        Ok(Self { dispatcher })
    }

    /// Run `source` for its side effects.
    pub fn execute(&self, source: impl Into<String>) -> Result<()> {
        self.evaluate(source).map(|_| ())
    }

    /// Read a script file on the calling thread and run it on the engine.
    pub fn execute_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let source = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Executing script file {}", path.as_ref().display());
        self.execute(source)
    }

    /// Evaluate `source` and return the completion value as JSON.
    pub fn evaluate(&self, source: impl Into<String>) -> Result<JsonValue> {
        let source = source.into();
        self.dispatcher.try_invoke(move || eval_on_worker(&source))
    }

    /// Async form of [`evaluate`](Self::evaluate).
    ///
    /// The script is queued when this method is called, not when the returned
    /// future is first polled.
    pub fn evaluate_async(
        &self,
        source: impl Into<String>,
    ) -> impl Future<Output = Result<JsonValue>> + Send + 'static {
        let source = source.into();
        let pending = self.dispatcher.invoke_async(move || eval_on_worker(&source));
        async move { pending.await? }
    }

    /// Call the global function `name` with JSON arguments.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Script`] if `name` is not a callable global or
    /// the function throws.
    pub fn call_function(
        &self,
        name: impl Into<String>,
        args: Vec<JsonValue>,
    ) -> Result<JsonValue> {
        let name = name.into();
        self.dispatcher.try_invoke(move || call_on_worker(&name, args))
    }

    /// Async form of [`call_function`](Self::call_function).
    pub fn call_function_async(
        &self,
        name: impl Into<String>,
        args: Vec<JsonValue>,
    ) -> impl Future<Output = Result<JsonValue>> + Send + 'static {
        let name = name.into();
        let pending = self.dispatcher.invoke_async(move || call_on_worker(&name, args));
        async move { pending.await? }
    }

    /// Set the global `name` to `value`.
    pub fn set_variable(&self, name: impl Into<String>, value: JsonValue) -> Result<()> {
        let name = name.into();
        self.dispatcher.try_invoke(move || {
            with_context(|ctx| {
                let value = json_to_js_value(value, ctx)?;
                ctx.global_object().set(js_string!(name.as_str()), value, true, ctx)?;
                Ok(())
            })
        })
    }

    /// Read the global `name`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Script`] if no such global exists.
    pub fn get_variable(&self, name: impl Into<String>) -> Result<JsonValue> {
        let name = name.into();
        self.dispatcher.try_invoke(move || {
            with_context(|ctx| {
                let global = ctx.global_object();
                if !global.has_property(js_string!(name.as_str()), ctx)? {
                    return Err(EngineError::Script(format!("{} is not defined", name)));
                }
                let value = global.get(js_string!(name.as_str()), ctx)?;
                js_value_to_json(value, ctx)
            })
        })
    }

    pub fn has_variable(&self, name: impl Into<String>) -> Result<bool> {
        let name = name.into();
        self.dispatcher.try_invoke(move || {
            with_context(|ctx| {
                let found = ctx
                    .global_object()
                    .has_property(js_string!(name.as_str()), ctx)?;
                Ok(found)
            })
        })
    }

    /// Delete the global `name`. Removing a missing global is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Script`] if the global is not configurable
    /// (e.g. declared with `var`).
    pub fn remove_variable(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.dispatcher.try_invoke(move || {
            with_context(|ctx| {
                ctx.global_object()
                    .delete_property_or_throw(js_string!(name.as_str()), ctx)?;
                Ok(())
            })
        })
    }

    /// Drop the context on its worker thread, then dispose the dispatcher.
    ///
    /// Returns `true` for the call that performed the shutdown. Every later
    /// operation fails with `EngineError::Dispatch(DispatchError::Disposed)`.
    pub fn dispose(&self) -> bool {
        if self.dispatcher.is_disposed() {
            return false;
        }

        if self.dispatcher.is_worker_thread() {
            drop_context();
        } else if let Err(e) = self.dispatcher.invoke(drop_context) {
            // Another disposer won; the context goes with the worker's
            // thread-locals.
            tracing::debug!("Context teardown skipped: {}", e);
        }

        self.dispatcher.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.dispatcher.is_disposed()
    }

    /// The dispatcher every engine operation runs through.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.dispatcher.stats()
    }
}

impl Drop for ScriptEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ScriptEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptEngine")
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
