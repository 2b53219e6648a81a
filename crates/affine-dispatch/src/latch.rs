use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot latch deciding which `dispose` call performs shutdown.
///
/// A compare-and-set on a single atomic leaves no window in which two threads
/// both believe they were first.
#[derive(Debug, Default)]
pub(crate) struct DisposalLatch {
    set: AtomicBool,
}

impl DisposalLatch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets the latch. Returns `true` only for the single caller that flipped it.
    pub(crate) fn try_set(&self) -> bool {
        self.set
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}
