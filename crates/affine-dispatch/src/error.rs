use thiserror::Error;

/// Errors produced by the dispatcher itself.
///
/// Errors raised *by a delegate* are not represented here: a typed delegate
/// error travels back unchanged through [`Dispatcher::try_invoke`], and a
/// delegate panic is resumed on the calling thread.
///
/// [`Dispatcher::try_invoke`]: crate::Dispatcher::try_invoke
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The dispatcher has begun (or finished) shutting down and accepts no work.
    #[error("Dispatcher has been disposed")]
    Disposed,

    /// The task was accepted but discarded during shutdown without running.
    #[error("Task was cancelled before it could run")]
    Cancelled,

    #[error("Invalid dispatcher configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl DispatchError {
    /// Returns `true` if this error means the dispatcher no longer accepts work.
    pub fn is_disposed(&self) -> bool {
        matches!(self, DispatchError::Disposed)
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(DispatchError::Disposed.to_string(), "Dispatcher has been disposed");
        assert_eq!(
            DispatchError::InvalidConfig("stack too small".into()).to_string(),
            "Invalid dispatcher configuration: stack too small"
        );
    }

    #[test]
    fn test_io_error_converts_to_spawn() {
        let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no memory");
        let err: DispatchError = io.into();
        assert!(matches!(err, DispatchError::Spawn(_)));
        assert!(!err.is_disposed());
    }
}
