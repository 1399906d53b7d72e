//! Session-scoped chat circuit breaker

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot breaker shared by every session of a controller
///
/// Once tripped it stays open for the life of the breaker; there is no
/// half-open state and no timer.
#[derive(Debug, Clone, Default)]
pub struct ChatBreaker {
    open: Arc<AtomicBool>,
}

impl ChatBreaker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether chat has been disabled
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Disable chat, returning `true` only for the call that tripped it
    pub fn trip(&self) -> bool {
        !self.open.swap(true, Ordering::SeqCst)
    }
}
