//! Top-level orchestration

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::actions::DispatchResult;
use crate::chat::{Chat, ChatMessage};
use crate::voice::{
    ActivationEvent, MonitorStatus, Speaker, Transcriber, WakeWordMonitor, WakeWordSettings,
};

use super::middleware::timed;
use super::{
    ChatBreaker, CommandSession, Dispatch, Notification, Notifier, PipelineState, SessionSettings,
    SharedState,
};

/// Everything the controller drives
pub struct Collaborators {
    pub transcriber: Arc<dyn Transcriber>,
    pub dispatcher: Arc<dyn Dispatch>,
    pub chat: Option<Arc<dyn Chat>>,
    pub speaker: Option<Arc<dyn Speaker>>,
}

/// Controller settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub session: SessionSettings,
    pub wake_word: WakeWordSettings,
    /// Start wake word monitoring with the pipeline
    pub wake_word_enabled: bool,
    /// Ambient noise calibration on start
    pub ambient_duration: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            wake_word: WakeWordSettings::default(),
            wake_word_enabled: false,
            ambient_duration: Duration::from_secs(1),
        }
    }
}

/// What a worker should do
enum Job {
    Text(String),
    Voice(Duration),
    /// Acknowledge a bare wake word, then capture a command
    WakeFollowUp(Duration),
}

struct Inner {
    collaborators: Collaborators,
    settings: PipelineSettings,
    state: SharedState,
    notifier: Notifier,
    receiver: Mutex<Option<UnboundedReceiver<Notification>>>,
    breaker: ChatBreaker,
    monitor: WakeWordMonitor,
}

/// Owns the pipeline lifecycle
///
/// `submit_*` calls return immediately; each command runs on its own tokio
/// task. Commands from independent submissions may run concurrently.
pub struct PipelineController {
    inner: Arc<Inner>,
}

impl PipelineController {
    /// Build a stopped controller
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        let (notifier, receiver) = Notifier::channel();
        let mut state = PipelineState::new(settings.session.history_window);
        state.wake_word_enabled = settings.wake_word_enabled;

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let monitor = WakeWordMonitor::new(
                Arc::clone(&collaborators.transcriber),
                settings.wake_word.clone(),
            );

            let weak = weak.clone();
            monitor.add_listener(Arc::new(move |event: &ActivationEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_activation(event);
                }
                Ok(())
            }));

            Inner {
                collaborators,
                settings,
                state: SharedState::new(state),
                notifier,
                receiver: Mutex::new(Some(receiver)),
                breaker: ChatBreaker::new(),
                monitor,
            }
        });

        Self { inner }
    }

    /// Take the observer channel; only the first call gets it
    pub fn take_notifications(&self) -> Option<UnboundedReceiver<Notification>> {
        self.inner
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Start the pipeline
    ///
    /// Calibrates the transcriber and, if enabled, starts wake word
    /// monitoring. Returns `true` once running, including when already
    /// running.
    pub async fn start(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.running {
                return true;
            }
            state.running = true;
        }

        let notifier = &self.inner.notifier;
        notifier.status("Initializing...");

        let calibrated = self
            .inner
            .collaborators
            .transcriber
            .adjust_for_ambient_noise(self.inner.settings.ambient_duration)
            .await;
        if !calibrated {
            tracing::warn!("ambient noise calibration failed");
            notifier.log("Could not calibrate for background noise; continuing with defaults.");
        }

        if self.inner.state.lock().wake_word_enabled {
            self.inner.start_wake_word();
        }

        notifier.status("Ready");
        notifier.log("Assistant started.");
        tracing::info!("pipeline started");
        true
    }

    /// Stop the pipeline
    ///
    /// Commands already in flight finish on their own tasks.
    pub async fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
        }

        if self.inner.monitor.is_running() {
            self.inner.monitor.stop().await;
        }

        self.inner.notifier.status("Stopped");
        self.inner.notifier.log("Assistant stopped.");
        tracing::info!("pipeline stopped");
    }

    /// Handle a typed command on a new task
    ///
    /// Returns `None` without scheduling anything when the pipeline is not
    /// running or the text is blank.
    pub fn submit_text(&self, text: &str) -> Option<JoinHandle<Option<DispatchResult>>> {
        if text.trim().is_empty() {
            return None;
        }
        self.inner.spawn(Job::Text(text.to_string()))
    }

    /// Capture and handle a voice command on a new task
    pub fn submit_voice(
        &self,
        duration: Option<Duration>,
    ) -> Option<JoinHandle<Option<DispatchResult>>> {
        let duration = duration.unwrap_or(self.inner.settings.session.command_duration);
        self.inner.spawn(Job::Voice(duration))
    }

    /// Toggle wake word monitoring
    ///
    /// Takes effect immediately when running, otherwise on the next start.
    pub async fn set_wake_word_enabled(&self, enabled: bool) {
        let running = {
            let mut state = self.inner.state.lock();
            state.wake_word_enabled = enabled;
            state.running
        };

        if !running {
            return;
        }

        if enabled {
            self.inner.start_wake_word();
        } else if self.inner.monitor.is_running() {
            self.inner.monitor.stop().await;
            self.inner.notifier.log("Wake word stopped.");
            self.inner.notifier.status("Wake word: OFF");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    #[must_use]
    pub fn wake_word_enabled(&self) -> bool {
        self.inner.state.lock().wake_word_enabled
    }

    /// Whether chat fallback has been disabled for this session
    #[must_use]
    pub fn chat_disabled(&self) -> bool {
        self.inner.breaker.is_open()
    }

    /// Copy of the conversation history
    #[must_use]
    pub fn history(&self) -> Vec<ChatMessage> {
        self.inner.state.lock().history.snapshot()
    }

    /// Forget the conversation so far
    pub fn clear_history(&self) {
        self.inner.state.lock().history.clear();
        tracing::debug!("conversation history cleared");
    }

    /// Wake word monitor status
    #[must_use]
    pub fn wake_word_status(&self) -> MonitorStatus {
        self.inner.monitor.status()
    }
}

impl Inner {
    fn session(&self) -> CommandSession {
        let collaborators = &self.collaborators;
        let mut session = CommandSession::new(
            Arc::clone(&collaborators.transcriber),
            Arc::clone(&collaborators.dispatcher),
            self.state.clone(),
            self.notifier.clone(),
            self.settings.session.clone(),
        );

        if let Some(chat) = &collaborators.chat {
            session = session.with_chat(Arc::clone(chat), self.breaker.clone());
        }
        if let Some(speaker) = &collaborators.speaker {
            session = session.with_speaker(Arc::clone(speaker));
        }
        session
    }

    /// Run `job` on a fresh task if the pipeline is running
    fn spawn(&self, job: Job) -> Option<JoinHandle<Option<DispatchResult>>> {
        if !self.state.lock().running {
            tracing::debug!("pipeline not running, ignoring submission");
            return None;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("no tokio runtime to run the command on");
            return None;
        };

        let session = self.session();
        let speaker = self
            .collaborators
            .speaker
            .clone()
            .filter(|_| self.settings.session.speak_results);

        Some(runtime.spawn(async move {
            match job {
                Job::Text(text) => timed("text command", session.run_text(&text)).await,
                Job::Voice(duration) => timed("voice command", session.run(duration)).await,
                Job::WakeFollowUp(duration) => {
                    if let Some(speaker) = speaker {
                        speaker.speak("Yes?").await;
                    }
                    timed("voice command", session.run(duration)).await
                }
            }
        }))
    }

    /// Wake word listener; runs on the monitor task, so only schedules work
    fn on_activation(&self, event: &ActivationEvent) {
        if !self.state.lock().running {
            return;
        }

        self.notifier.log(format!("Wake word: '{}'", event.trigger_phrase));

        let job = event.command().map_or(
            Job::WakeFollowUp(self.settings.session.command_duration),
            Job::Text,
        );
        // Detached: the result reaches the observer through notifications
        drop(self.spawn(job));
    }

    fn start_wake_word(&self) {
        if self.monitor.is_running() {
            return;
        }

        if self.monitor.start() {
            self.notifier.log("Wake word listening started.");
            self.notifier.status("Wake word: ON");
        } else {
            self.state.lock().wake_word_enabled = false;
            self.notifier.log("Wake word failed to start; continuing without it.");
            self.notifier.status("Wake word: OFF");
        }
    }
}
