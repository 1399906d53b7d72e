//! Wake word monitoring
//!
//! [`WakeWordMonitor`] runs one background task that repeatedly transcribes
//! short audio chunks and looks for a configured trigger phrase:
//!
//! ```text
//! IDLE ─start─▶ LISTENING ─chunk─▶ PROCESSING ─match─▶ DETECTED ─cooldown─┐
//!                  ▲                    │                                  │
//!                  │                    └─error─▶ ERROR ─backoff─┐         │
//!                  └─────────────────────────────────────────────┴─────────┘
//! ```
//!
//! Cancellation is cooperative: the running flag is checked between steps.
//! [`WakeWordMonitor::stop`] waits up to the join timeout for the task and
//! aborts it if a transcription is still in flight.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::Transcriber;

/// Confidence reported for every activation
///
/// Detection is plain substring matching on a transcript, so there is no
/// acoustic score to report.
pub const ACTIVATION_CONFIDENCE: f32 = 0.8;

/// State of the wake word monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// Not running
    Idle,
    /// Capturing the next chunk
    Listening,
    /// Checking a transcript for trigger phrases
    Processing,
    /// A trigger phrase was heard; cooling down
    Detected,
    /// Transcription failed; backing off
    Error,
}

/// Emitted once per detected trigger phrase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationEvent {
    /// Configured phrase that matched
    pub trigger_phrase: String,
    /// Detection confidence in `0..=1`
    pub confidence: f32,
    /// When the phrase was detected
    pub timestamp: DateTime<Utc>,
    /// Full transcript of the chunk that matched
    pub transcript: String,
}

impl ActivationEvent {
    /// Text following the trigger phrase, if any
    #[must_use]
    pub fn command(&self) -> Option<String> {
        extract_command(&self.transcript, &self.trigger_phrase)
    }
}

/// Snapshot returned by [`WakeWordMonitor::status`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub is_running: bool,
    pub listener_count: usize,
    pub trigger_phrases: Vec<String>,
}

/// Listener callback
///
/// Runs on the monitor task, so it should hand work off rather than block.
/// An `Err` or a panic is logged and does not affect other listeners.
pub type Listener = Arc<dyn Fn(&ActivationEvent) -> Result<(), String> + Send + Sync>;

/// Handle returned by [`WakeWordMonitor::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

/// Loop timings and trigger phrases
#[derive(Debug, Clone)]
pub struct WakeWordSettings {
    pub trigger_phrases: Vec<String>,
    /// Audio captured per iteration
    pub chunk: Duration,
    /// Pause after a detection
    pub cooldown: Duration,
    /// Pause after a transcription error
    pub error_backoff: Duration,
    /// Minimum confidence for an activation to be emitted
    pub confidence_threshold: f32,
    /// How long [`WakeWordMonitor::stop`] waits for the task
    pub join_timeout: Duration,
}

impl Default for WakeWordSettings {
    fn default() -> Self {
        Self {
            trigger_phrases: vec!["hey assistant".to_string(), "computer".to_string()],
            chunk: Duration::from_secs(2),
            cooldown: Duration::from_secs(1),
            error_backoff: Duration::from_millis(500),
            confidence_threshold: 0.6,
            join_timeout: Duration::from_secs(2),
        }
    }
}

impl WakeWordSettings {
    /// Settings with the given phrases and default timings
    #[must_use]
    pub fn with_phrases(phrases: Vec<String>) -> Self {
        Self {
            trigger_phrases: phrases,
            ..Self::default()
        }
    }
}

/// State shared between the monitor handle and its task
struct Shared {
    running: AtomicBool,
    state: Mutex<MonitorState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl Shared {
    fn set_state(&self, state: MonitorState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn state(&self) -> MonitorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Deliver `event` to a snapshot of the listeners
    fn notify(&self, event: &ActivationEvent) {
        let listeners: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, listener) in listeners {
            match std::panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(listener = ?id, error = %e, "wake word listener failed");
                }
                Err(_) => tracing::error!(listener = ?id, "wake word listener panicked"),
            }
        }
    }
}

/// Background wake word detector
pub struct WakeWordMonitor {
    transcriber: Arc<dyn Transcriber>,
    settings: WakeWordSettings,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WakeWordMonitor {
    /// Create a stopped monitor
    ///
    /// Trigger phrases are lower-cased and trimmed; empty phrases are dropped.
    #[must_use]
    pub fn new(transcriber: Arc<dyn Transcriber>, mut settings: WakeWordSettings) -> Self {
        settings.trigger_phrases = settings
            .trigger_phrases
            .iter()
            .map(|p| p.to_lowercase().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        tracing::debug!(phrases = ?settings.trigger_phrases, "wake word monitor initialized");

        Self {
            transcriber,
            settings,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                state: Mutex::new(MonitorState::Idle),
                listeners: Mutex::new(Vec::new()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Launch the detection task
    ///
    /// Returns `true` if the monitor is running afterwards. Fails when there
    /// are no trigger phrases or no tokio runtime to spawn on.
    pub fn start(&self) -> bool {
        if self.shared.is_running() {
            tracing::warn!("wake word monitor already running");
            return true;
        }

        if self.settings.trigger_phrases.is_empty() {
            tracing::error!("no trigger phrases configured");
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("wake word monitor needs a tokio runtime");
            return false;
        };

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.set_state(MonitorState::Listening);

        let handle = runtime.spawn(detection_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.transcriber),
            self.settings.clone(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        tracing::info!("wake word detection started");
        true
    }

    /// Stop the detection task, waiting up to the join timeout
    pub async fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut handle) = handle {
            // A task left running would resume on the next start
            if tokio::time::timeout(self.settings.join_timeout, &mut handle)
                .await
                .is_err()
            {
                tracing::warn!("wake word task did not finish in time, aborting");
                handle.abort();
            }
        }

        self.shared.set_state(MonitorState::Idle);
        tracing::info!("wake word detection stopped");
    }

    /// Register a listener; listeners are called in registration order
    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(Uuid::new_v4());
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        tracing::debug!(listener = ?id, "added wake word listener");
        id
    }

    /// Unregister a listener, returning whether it was registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self
            .shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    /// Current state snapshot
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            state: self.shared.state(),
            is_running: self.shared.is_running(),
            listener_count: self
                .shared
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
            trigger_phrases: self.settings.trigger_phrases.clone(),
        }
    }

    /// Whether the detection task is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }
}

async fn detection_loop(
    shared: Arc<Shared>,
    transcriber: Arc<dyn Transcriber>,
    settings: WakeWordSettings,
) {
    tracing::debug!("detection loop started");

    while shared.is_running() {
        shared.set_state(MonitorState::Listening);
        let chunk = transcriber.listen(settings.chunk).await;

        if !shared.is_running() {
            break;
        }
        shared.set_state(MonitorState::Processing);

        if !chunk.success {
            if let Some(error) = chunk.error {
                tracing::warn!(%error, "wake word transcription failed");
                shared.set_state(MonitorState::Error);
                tokio::time::sleep(settings.error_backoff).await;
            }
            continue;
        }

        let Some(phrase) = match_trigger(&settings.trigger_phrases, &chunk.text) else {
            tracing::trace!(transcript = %chunk.text, "no trigger phrase");
            continue;
        };

        if ACTIVATION_CONFIDENCE < settings.confidence_threshold {
            tracing::debug!(phrase, "activation below confidence threshold");
            continue;
        }

        shared.set_state(MonitorState::Detected);
        tracing::info!(phrase, transcript = %chunk.text, "wake word detected");

        let event = ActivationEvent {
            trigger_phrase: phrase.to_string(),
            confidence: ACTIVATION_CONFIDENCE,
            timestamp: Utc::now(),
            transcript: chunk.text,
        };
        shared.notify(&event);

        tokio::time::sleep(settings.cooldown).await;
    }

    if shared.is_running() {
        shared.set_state(MonitorState::Listening);
    }
    tracing::debug!("detection loop exited");
}

/// First configured phrase contained in `transcript`, case-insensitively
fn match_trigger<'a>(phrases: &'a [String], transcript: &str) -> Option<&'a str> {
    let normalized = transcript.to_lowercase();
    phrases
        .iter()
        .find(|phrase| normalized.contains(phrase.as_str()))
        .map(String::as_str)
}

/// Text following `trigger_phrase` in `transcript`, if any
///
/// Leading punctuation and whitespace are stripped, so
/// `"Hey assistant, open chrome"` yields `"open chrome"`.
#[must_use]
pub fn extract_command(transcript: &str, trigger_phrase: &str) -> Option<String> {
    let lower = transcript.to_lowercase();
    let phrase = trigger_phrase.to_lowercase();
    let start = lower.find(&phrase)? + phrase.len();

    // Lower-casing can change byte lengths outside ASCII; fall back to the
    // lower-cased text when offsets no longer line up
    let rest = transcript
        .get(start..)
        .filter(|_| lower.len() == transcript.len())
        .unwrap_or(&lower[start..]);

    let command = rest
        .trim_start_matches(|c: char| {
            c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ':' | ';' | '-')
        })
        .trim_end();

    (!command.is_empty()).then(|| command.to_string())
}
