//! Host bindings exposed to scripts
//!
//! Scripts see a single global `host` object:
//!
//! - `host.log(...values)` - write the values, space separated, to the
//!   `script` tracing target at info level
//! - `host.threadName()` - the name of the thread the script is running on

use crate::error::{EngineError, Result};
use boa_engine::{
    js_string,
    native_function::NativeFunction,
    object::{FunctionObjectBuilder, JsObject},
    property::Attribute,
    value::JsValue,
    Context, JsResult,
};

fn host_log(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(arg.to_string(ctx)?.to_std_string_escaped());
    }

    tracing::info!(target: "script", "{}", parts.join(" "));
    Ok(JsValue::undefined())
}

fn host_thread_name(_this: &JsValue, _args: &[JsValue], _ctx: &mut Context) -> JsResult<JsValue> {
    let current = std::thread::current();
    let name = current.name().unwrap_or_default();
    Ok(JsValue::new(js_string!(name)))
}

/// Install the `host` global into `ctx`.
pub(crate) fn install_host_bindings(ctx: &mut Context) -> Result<()> {
    let host = JsObject::with_object_proto(ctx.intrinsics());

    let log_fn = FunctionObjectBuilder::new(ctx.realm(), NativeFunction::from_fn_ptr(host_log))
        .name(js_string!("log"))
        .length(0)
        .build();
    host.set(js_string!("log"), log_fn, false, ctx)?;

    let thread_name_fn =
        FunctionObjectBuilder::new(ctx.realm(), NativeFunction::from_fn_ptr(host_thread_name))
            .name(js_string!("threadName"))
            .length(0)
            .build();
    host.set(js_string!("threadName"), thread_name_fn, false, ctx)?;

    ctx.register_global_property(js_string!("host"), host, Attribute::all())
        .map_err(|e| EngineError::Script(e.to_string()))?;

    Ok(())
}
