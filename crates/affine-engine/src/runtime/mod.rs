pub mod engine;

mod bindings;
mod conversions;


pub use engine::{recursion_limit_for, ScriptEngine, DEFAULT_ENGINE_THREAD_NAME};
