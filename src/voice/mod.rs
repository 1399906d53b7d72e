//! Voice processing module
//!
//! Handles audio capture, transcription, speech output and wake word
//! monitoring. The pipeline only sees the [`Transcriber`] and [`Speaker`]
//! traits; [`WhisperTranscriber`] and [`SystemSpeaker`] are the bundled
//! implementations.

mod capture;
mod stt;
mod tts;
mod wake_word;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use capture::{AudioCapture, SAMPLE_RATE, calculate_energy, samples_to_wav};
pub use stt::{WHISPER_URL, WhisperTranscriber};
pub use tts::SystemSpeaker;
pub use wake_word::{
    ActivationEvent, Listener, ListenerId, MonitorState, MonitorStatus, WakeWordMonitor,
    WakeWordSettings, extract_command,
};

/// Outcome of one transcription attempt
///
/// "Nothing understood" is a normal value here, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Transcribed text, empty on failure
    pub text: String,
    /// Whether `text` is usable
    pub success: bool,
    /// Recognition confidence in `0..=1`
    pub confidence: f32,
    /// Length of audio that was captured
    pub duration_seconds: f32,
    /// Failure description; `None` when nothing was heard
    pub error: Option<String>,
}

impl RecognitionResult {
    /// Successful transcription
    #[must_use]
    pub fn heard(text: impl Into<String>, confidence: f32, duration: Duration) -> Self {
        Self {
            text: text.into(),
            success: true,
            confidence,
            duration_seconds: duration.as_secs_f32(),
            error: None,
        }
    }

    /// Nothing intelligible was captured
    #[must_use]
    pub fn silence(duration: Duration) -> Self {
        Self {
            text: String::new(),
            success: false,
            confidence: 0.0,
            duration_seconds: duration.as_secs_f32(),
            error: None,
        }
    }

    /// Capture or transcription failed
    #[must_use]
    pub fn failed(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::silence(duration)
        }
    }
}

/// Speech-to-text collaborator
///
/// Implementations never fail across this boundary: every problem is
/// reported through [`RecognitionResult`].
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Calibrate against background noise for `duration`
    async fn adjust_for_ambient_noise(&self, duration: Duration) -> bool;

    /// Capture up to `duration` of speech and transcribe it
    async fn listen(&self, duration: Duration) -> RecognitionResult;
}

/// Text-to-speech collaborator
#[async_trait]
pub trait Speaker: Send + Sync {
    /// Speak `text`, returning whether playback succeeded
    async fn speak(&self, text: &str) -> bool;
}

/// [`Transcriber`] for text-only operation
///
/// Every listen fails with `reason`, which should read like a device problem
/// so voice submissions get the microphone notice.
#[derive(Debug, Clone)]
pub struct DisabledTranscriber {
    reason: String,
}

impl DisabledTranscriber {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn adjust_for_ambient_noise(&self, _duration: Duration) -> bool {
        true
    }

    async fn listen(&self, _duration: Duration) -> RecognitionResult {
        RecognitionResult::failed(self.reason.clone(), Duration::ZERO)
    }
}
