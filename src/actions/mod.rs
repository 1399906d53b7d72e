//! Action execution
//!
//! [`ActionDispatcher`] routes a classified [`Intent`](crate::intent::Intent)
//! to a handler, and each handler performs exactly one [`ActionProvider`]
//! call. OS-level execution lives behind the provider trait; the bundled
//! [`SystemActionProvider`] shells out to platform tools.

mod dispatcher;
mod system;
mod validate;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use dispatcher::{ActionDispatcher, DispatchResult, DispatchSettings};
pub use system::SystemActionProvider;
pub use validate::{timer_seconds, validate_app_name};

/// A single capability request handed to an [`ActionProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Launch an application by spoken name
    OpenApp { app_name: String },
    /// Terminate an application by spoken name
    CloseApp { app_name: String },
    /// Open a web search in the default browser
    SearchWeb { query: String },
    /// Start music playback, optionally for a specific song
    PlayMusic { song: Option<String> },
    /// Start a countdown timer
    SetTimer { seconds: u64, label: String },
    /// Report the current local time
    ReportTime,
    /// Raise output volume by `step` percent
    VolumeUp { step: u8 },
    /// Lower output volume by `step` percent
    VolumeDown { step: u8 },
    /// Mute audio output
    Mute,
    /// Unmute audio output
    Unmute,
    /// Capture the screen to a file
    Screenshot,
    /// Lock the session
    LockScreen,
    /// Skip to the next media track
    MediaNext,
    /// Go back to the previous media track
    MediaPrevious,
    /// Power off the machine
    Shutdown,
}

impl Action {
    /// Capability name used in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenApp { .. } => "open_app",
            Self::CloseApp { .. } => "close_app",
            Self::SearchWeb { .. } => "search_web",
            Self::PlayMusic { .. } => "play_music",
            Self::SetTimer { .. } => "set_timer",
            Self::ReportTime => "report_time",
            Self::VolumeUp { .. } => "volume_up",
            Self::VolumeDown { .. } => "volume_down",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::Screenshot => "screenshot",
            Self::LockScreen => "lock_screen",
            Self::MediaNext => "media_next",
            Self::MediaPrevious => "media_previous",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Outcome of a provider call that ran to completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    /// Whether the capability reported success
    pub success: bool,
    /// Capability-specific data (e.g. `time`, `path`)
    pub data: Map<String, Value>,
}

impl ActionOutcome {
    /// Successful outcome with no data
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            data: Map::new(),
        }
    }

    /// Failed outcome with no data
    #[must_use]
    pub fn failed() -> Self {
        Self::default()
    }

    /// Attach a data field
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// A provider call that could not run to completion
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The capability is not available on this machine
    #[error("{0} is not available on this system")]
    Unavailable(String),

    /// The capability ran and reported an error
    #[error("{0}")]
    Failed(String),

    /// Spawning or waiting on a helper process failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// OS-level capability set used by the dispatcher
///
/// Implementations must be safe to call concurrently; any serialization the
/// platform needs belongs here, not in the pipeline.
#[async_trait]
pub trait ActionProvider: Send + Sync {
    /// Execute one capability
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when the capability cannot run at all; a
    /// capability that ran but did not succeed returns
    /// `Ok(ActionOutcome { success: false, .. })`.
    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError>;
}
