//! Shared pipeline state

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::ConversationHistory;

/// The only core state shared across tasks
///
/// Guarded by one mutex; never hold the guard across an `.await`.
#[derive(Debug)]
pub struct PipelineState {
    pub running: bool,
    pub wake_word_enabled: bool,
    pub history: ConversationHistory,
}

impl PipelineState {
    #[must_use]
    pub fn new(history_window: usize) -> Self {
        Self {
            running: false,
            wake_word_enabled: false,
            history: ConversationHistory::new(history_window),
        }
    }
}

/// Handle to the shared state
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<PipelineState>>);

impl SharedState {
    #[must_use]
    pub fn new(state: PipelineState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Lock the state, recovering from a poisoned mutex
    pub fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
