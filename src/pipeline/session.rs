//! One command: capture, classify, dispatch, fall back to chat, report

use std::sync::Arc;
use std::time::Duration;

use crate::actions::DispatchResult;
use crate::chat::{Chat, ChatMessage};
use crate::intent::{Intent, IntentKind, IntentParser};
use crate::voice::{Speaker, Transcriber};

use super::{ChatBreaker, Dispatch, Notifier, SharedState};

/// Minimum parser confidence for an intent to be dispatched
pub const MIN_DISPATCH_CONFIDENCE: f32 = 0.5;

pub(crate) const RETRY_NOTICE: &str = "Didn't catch that, trying again...";
pub(crate) const NOT_UNDERSTOOD_NOTICE: &str = "I didn't understand that command";
pub(crate) const LLM_UNREACHABLE_NOTICE: &str = "Local LLM is not reachable (e.g. Ollama not running \
on localhost:11434). I'll continue without chat mode.";

/// Per-session knobs
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Audio captured per voice attempt
    pub command_duration: Duration,
    /// Extra transcription attempts after the first
    pub retry_count: u32,
    /// Parser confidence needed to dispatch
    pub min_confidence: f32,
    /// Conversation turns kept for chat
    pub history_window: usize,
    /// Prepended to every chat request
    pub system_prompt: String,
    /// Speak results through the speaker
    pub speak_results: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            command_duration: Duration::from_secs(5),
            retry_count: 1,
            min_confidence: MIN_DISPATCH_CONFIDENCE,
            history_window: 8,
            system_prompt: crate::config::DEFAULT_SYSTEM_PROMPT.to_string(),
            speak_results: true,
        }
    }
}

/// Why the final transcription attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionFailure {
    Network,
    Timeout,
    Device,
    Other,
}

impl TranscriptionFailure {
    /// Classify a transcriber error message by substring
    #[must_use]
    pub fn classify(error: Option<&str>) -> Self {
        let Some(error) = error else {
            return Self::Other;
        };
        let error = error.to_lowercase();

        if error.contains("network") || error.contains("connection") {
            Self::Network
        } else if error.contains("timeout") || error.contains("timed out") {
            Self::Timeout
        } else if error.contains("microphone") || error.contains("device") {
            Self::Device
        } else {
            Self::Other
        }
    }

    /// User-facing notice for this failure
    #[must_use]
    pub const fn notice(self) -> &'static str {
        match self {
            Self::Network => {
                "Could not connect to speech recognition service. Check your internet connection."
            }
            Self::Timeout => "Speech recognition timed out. Please try again.",
            Self::Device => "Microphone not detected. Check your audio device settings.",
            Self::Other => "Could not understand audio. Please speak clearly or try typing instead.",
        }
    }
}

/// A single command invocation
///
/// Cheap to build: every collaborator is shared. The controller creates one
/// per submission and runs it on its own task.
#[derive(Clone)]
pub struct CommandSession {
    transcriber: Arc<dyn Transcriber>,
    parser: IntentParser,
    dispatcher: Arc<dyn Dispatch>,
    chat: Option<Arc<dyn Chat>>,
    breaker: ChatBreaker,
    speaker: Option<Arc<dyn Speaker>>,
    state: SharedState,
    notifier: Notifier,
    settings: SessionSettings,
}

impl CommandSession {
    /// Create a session without chat fallback or speech
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        dispatcher: Arc<dyn Dispatch>,
        state: SharedState,
        notifier: Notifier,
        settings: SessionSettings,
    ) -> Self {
        Self {
            transcriber,
            parser: IntentParser::new(),
            dispatcher,
            chat: None,
            breaker: ChatBreaker::new(),
            speaker: None,
            state,
            notifier,
            settings,
        }
    }

    /// Enable chat fallback guarded by `breaker`
    #[must_use]
    pub fn with_chat(mut self, chat: Arc<dyn Chat>, breaker: ChatBreaker) -> Self {
        self.chat = Some(chat);
        self.breaker = breaker;
        self
    }

    /// Speak results through `speaker`
    #[must_use]
    pub fn with_speaker(mut self, speaker: Arc<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    /// Capture a voice command and handle it
    ///
    /// Returns `None` when nothing could be transcribed or nothing handled
    /// the utterance; a notice has been emitted in either case.
    pub async fn run(&self, duration: Duration) -> Option<DispatchResult> {
        self.notifier.status("Listening...");
        self.notifier.log("Listening for voice command...");

        let attempts = self.settings.retry_count.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let recognition = self.transcriber.listen(duration).await;
            tracing::debug!(attempt, success = recognition.success, "transcription attempt");

            if recognition.success && !recognition.text.trim().is_empty() {
                let result = self.handle(&recognition.text).await;
                self.notifier.status("Ready");
                return result;
            }

            last_error = recognition.error;
            if attempt < attempts {
                self.notifier.log(RETRY_NOTICE);
            }
        }

        let failure = TranscriptionFailure::classify(last_error.as_deref());
        tracing::warn!(?failure, error = ?last_error, "voice command not captured");
        self.notifier.log(failure.notice());
        self.notifier.status("Ready");
        None
    }

    /// Handle a typed command
    pub async fn run_text(&self, text: &str) -> Option<DispatchResult> {
        if text.trim().is_empty() {
            self.notifier.log("Nothing to process");
            return None;
        }

        let result = self.handle(text).await;
        self.notifier.status("Ready");
        result
    }

    async fn handle(&self, text: &str) -> Option<DispatchResult> {
        let text = text.trim();
        self.notifier.status("Processing...");
        self.notifier.log(format!("You: {text}"));
        self.state.lock().history.push(ChatMessage::user(text));

        let intent = self.parser.parse(text);
        self.notifier.intent(&intent);

        if !intent.is_unknown() && intent.confidence >= self.settings.min_confidence {
            let result = self.dispatcher.dispatch(&intent).await;
            self.report(&result).await;
            return Some(result);
        }

        if let Some(result) = self.chat_fallback(&intent).await {
            self.report(&result).await;
            return Some(result);
        }

        None
    }

    /// Ask the chat model; every failure emits exactly one notice
    async fn chat_fallback(&self, intent: &Intent) -> Option<DispatchResult> {
        let Some(chat) = self.chat.as_ref().filter(|_| !self.breaker.is_open()) else {
            self.notifier.log(NOT_UNDERSTOOD_NOTICE);
            return None;
        };

        let mut messages = vec![ChatMessage::system(&self.settings.system_prompt)];
        messages.extend(self.state.lock().history.snapshot());

        match chat.send(&messages).await {
            Ok(reply) if reply.trim().is_empty() => {
                self.notifier.log(NOT_UNDERSTOOD_NOTICE);
                None
            }
            // No action ran, so the reply is never attributed to the parsed kind
            Ok(reply) => Some(
                DispatchResult::success(IntentKind::Unknown, reply)
                    .with_extra("source", "chat")
                    .with_extra("parsed_intent", intent.kind.as_str()),
            ),
            Err(e) if e.is_connection() => {
                if self.breaker.trip() {
                    tracing::warn!(error = %e, "chat unreachable, disabling for this session");
                    self.notifier.log(LLM_UNREACHABLE_NOTICE);
                } else {
                    self.notifier.log(NOT_UNDERSTOOD_NOTICE);
                }
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                self.notifier.log(format!("LLM error: {e}"));
                None
            }
        }
    }

    /// Record, publish and optionally speak a result
    async fn report(&self, result: &DispatchResult) {
        if !result.message.is_empty() {
            self.state
                .lock()
                .history
                .push(ChatMessage::assistant(&result.message));
        }

        self.notifier.result(result);
        self.notifier.log(format!("Spark: {}", result.message));

        if self.settings.speak_results {
            if let Some(speaker) = &self.speaker {
                if !speaker.speak(&result.message).await {
                    tracing::debug!("speech output failed");
                }
            }
        }
    }
}
