//! Engine-wide shutdown latch

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-way flag raised by `WorkflowEngine::shutdown`
///
/// Every suspension point in every active step checks the latch; once it is
/// raised, the checking step parks forever instead of proceeding. Single
/// write, many reads; never lowered.
#[derive(Debug, Clone, Default)]
pub struct ShutdownLatch {
    raised: Arc<AtomicBool>,
}

impl ShutdownLatch {
    /// Create a new, unraised latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the latch
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Check whether the latch has been raised
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}
