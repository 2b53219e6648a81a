use affine_dispatch::DispatchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("JavaScript execution error: {0}")]
    Script(String),

    #[error("Value conversion error: {0}")]
    Conversion(String),

    #[error("Engine context is not available on this thread")]
    ContextUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<boa_engine::JsError> for EngineError {
    fn from(err: boa_engine::JsError) -> Self {
        EngineError::Script(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
