//! Worker thread configuration.
//!
//! Script engines can recurse far deeper than a default 2 MiB thread stack
//! allows, so the worker gets a much larger stack. The stack is allocated
//! once, for the lifetime of the dispatcher.

/// Default worker stack size: 16 MiB.
pub const DEFAULT_STACK_SIZE: usize = 16 * 1024 * 1024;

/// Smallest stack size accepted by [`DispatcherConfig::validate`].
pub const MIN_STACK_SIZE: usize = 256 * 1024;

/// Largest stack size accepted by [`DispatcherConfig::validate`].
pub const MAX_STACK_SIZE: usize = 1024 * 1024 * 1024;

/// Default name given to the worker thread.
pub const DEFAULT_THREAD_NAME: &str = "affine-dispatcher";

/// Configuration for a [`Dispatcher`](crate::Dispatcher) worker thread.
///
/// # Example
///
/// ```
/// use affine_dispatch::DispatcherConfig;
///
/// let config = DispatcherConfig::new()
///     .with_stack_size(32 * 1024 * 1024)
///     .with_thread_name("js-engine");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Stack size of the worker thread in bytes
    pub stack_size: usize,
    /// Name of the worker thread, visible in debuggers and panic messages
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Creates a configuration with the default stack size and thread name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker stack size in bytes.
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Sets the worker thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if:
    /// - the stack size is outside `MIN_STACK_SIZE..=MAX_STACK_SIZE`
    /// - the thread name is empty or contains a NUL byte
    pub fn validate(&self) -> Result<(), String> {
        if self.stack_size < MIN_STACK_SIZE {
            return Err(format!(
                "stack size must be at least {} bytes (got {})",
                MIN_STACK_SIZE, self.stack_size
            ));
        }

        if self.stack_size > MAX_STACK_SIZE {
            return Err(format!(
                "stack size must be <= 1 GiB (got {} bytes)",
                self.stack_size
            ));
        }

        if self.thread_name.is_empty() {
            return Err("thread name must not be empty".to_string());
        }

        // std::thread::Builder panics on interior NUL bytes
        if self.thread_name.contains('\0') {
            return Err("thread name must not contain NUL bytes".to_string());
        }

        Ok(())
    }
}
