//! JSON <-> JavaScript value conversions
//!
//! Values cross the dispatcher boundary as `serde_json::Value`, because Boa's
//! `JsValue` is tied to the context (and thread) that created it.
//!
//! # Type Mapping
//!
//! | JSON Type | JavaScript Type |
//! |-----------|-----------------|
//! | null | null / undefined |
//! | boolean | Boolean |
//! | number | Number (integral values become JSON integers) |
//! | string | String |
//! | array | Array |
//! | object | Object |
//!
//! Functions, symbols, `NaN` and infinities become JSON `null`, matching
//! `JSON.stringify`. Symbol keys are skipped.

use crate::error::{EngineError, Result};
use boa_engine::{
    js_string,
    object::{builtins::JsArray, JsObject},
    property::PropertyKey,
    value::JsValue,
    Context,
};
use serde_json::Value as JsonValue;

/// Nesting limit for JS -> JSON conversion; also stops cyclic objects.
const MAX_DEPTH: usize = 128;

/// Largest integer a JS number represents exactly (2^53).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Convert a JSON value into a JavaScript value owned by `ctx`.
pub(crate) fn json_to_js_value(json: JsonValue, ctx: &mut Context) -> Result<JsValue> {
    match json {
        JsonValue::Null => Ok(JsValue::null()),
        JsonValue::Bool(b) => Ok(JsValue::new(b)),
        JsonValue::Number(n) => n
            .as_f64()
            .map(JsValue::new)
            .ok_or_else(|| EngineError::Conversion(format!("Number out of range: {}", n))),
        JsonValue::String(s) => Ok(JsValue::new(js_string!(s.as_str()))),
        JsonValue::Array(items) => {
            let array = JsArray::new(ctx);
            for (i, item) in items.into_iter().enumerate() {
                let value = json_to_js_value(item, ctx)?;
                array.push(value, ctx).map_err(|e| {
                    EngineError::Conversion(format!("Failed to push array element {}: {}", i, e))
                })?;
            }
            Ok(array.into())
        }
        JsonValue::Object(map) => {
            let object = JsObject::with_object_proto(ctx.intrinsics());
            for (key, value) in map {
                let value = json_to_js_value(value, ctx)?;
                object
                    .create_data_property_or_throw(js_string!(key.as_str()), value, ctx)
                    .map_err(|e| {
                        EngineError::Conversion(format!("Failed to set property '{}': {}", key, e))
                    })?;
            }
            Ok(object.into())
        }
    }
}

/// Convert a JavaScript value into JSON.
///
/// # Errors
///
/// Returns [`EngineError::Conversion`] for strings that are not valid UTF-16,
/// for nesting deeper than 128 levels (including cycles), and when a property
/// getter throws.
pub(crate) fn js_value_to_json(value: JsValue, ctx: &mut Context) -> Result<JsonValue> {
    convert(value, ctx, 0)
}

fn convert(value: JsValue, ctx: &mut Context, depth: usize) -> Result<JsonValue> {
    if depth > MAX_DEPTH {
        return Err(EngineError::Conversion(format!(
            "Value nested deeper than {} levels (cyclic?)",
            MAX_DEPTH
        )));
    }

    if value.is_undefined() || value.is_null() || value.is_symbol() {
        return Ok(JsonValue::Null);
    }

    if let Some(b) = value.as_boolean() {
        return Ok(JsonValue::Bool(b));
    }

    if let Some(n) = value.as_number() {
        if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
            return Ok(JsonValue::from(n as i64));
        }
        return Ok(serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null));
    }

    if let Some(s) = value.as_string() {
        return s
            .to_std_string()
            .map(JsonValue::String)
            .map_err(|e| EngineError::Conversion(format!("String conversion error: {:?}", e)));
    }

    let Some(object) = value.as_object() else {
        // BigInt has no JSON representation
        return Ok(JsonValue::Null);
    };

    if object.is_callable() {
        return Ok(JsonValue::Null);
    }

    if object.is_array() {
        let array = JsArray::from_object(object.clone())
            .map_err(|e| EngineError::Conversion(format!("Object is not a valid array: {}", e)))?;

        let length: u32 = array
            .length(ctx)
            .map_err(|e| EngineError::Conversion(format!("Failed to get array length: {}", e)))?
            .try_into()
            .map_err(|_| EngineError::Conversion("Array length overflow".into()))?;

        let mut items = Vec::with_capacity(length as usize);
        for i in 0..length {
            let item = object.get(i, ctx).map_err(|e| {
                EngineError::Conversion(format!("Failed to get array element {}: {}", i, e))
            })?;
            items.push(convert(item, ctx, depth + 1)?);
        }
        return Ok(JsonValue::Array(items));
    }

    let keys = object
        .own_property_keys(ctx)
        .map_err(|e| EngineError::Conversion(format!("Failed to get object keys: {}", e)))?;

    let mut map = serde_json::Map::new();
    for key in keys {
        let name = match &key {
            PropertyKey::String(s) => s
                .to_std_string()
                .map_err(|e| EngineError::Conversion(format!("String conversion error: {:?}", e)))?,
            PropertyKey::Index(i) => i.get().to_string(),
            PropertyKey::Symbol(_) => continue,
        };

        let property = object.get(key.clone(), ctx).map_err(|e| {
            EngineError::Conversion(format!("Failed to get property '{}': {}", name, e))
        })?;
        map.insert(name, convert(property, ctx, depth + 1)?);
    }

    Ok(JsonValue::Object(map))
}
