//! Command pipeline
//!
//! ```text
//! WakeWordMonitor ──activation──▶ PipelineController ──spawn──▶ CommandSession
//!                                        ▲                          │
//!                     submit_text/voice ─┘      Transcriber ◀───────┤
//!                                               IntentParser ◀──────┤
//!                                               Dispatch ◀──────────┤
//!                                               Chat (fallback) ◀───┤
//!                                               Speaker ◀───────────┘
//!                                                   │
//!                         Notification channel ◀────┘
//! ```
//!
//! The controller owns the only shared mutable state ([`PipelineState`]) and
//! the observer channel. Sessions run on their own tasks and never block the
//! caller.

mod breaker;
mod controller;
mod history;
mod middleware;
mod notify;
mod session;
mod state;

pub use breaker::ChatBreaker;
pub use controller::{Collaborators, PipelineController, PipelineSettings};
pub use history::ConversationHistory;
pub use middleware::{Dispatch, TimedDispatch, timed};
pub use notify::{Notification, Notifier};
pub use session::{CommandSession, MIN_DISPATCH_CONFIDENCE, SessionSettings, TranscriptionFailure};
pub use state::{PipelineState, SharedState};
