//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use spark_assistant::actions::{
    Action, ActionDispatcher, ActionError, ActionOutcome, ActionProvider, DispatchSettings,
};
use spark_assistant::chat::{Chat, ChatError, ChatMessage};
use spark_assistant::pipeline::{Notification, Notifier};
use spark_assistant::voice::{RecognitionResult, Speaker, Transcriber};
use tokio::sync::mpsc::UnboundedReceiver;

/// Transcriber that replays a fixed script
///
/// Once the script runs out, `listen` parks for `idle` and then reports
/// silence, so background loops stay put instead of spinning.
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<RecognitionResult>>,
    calls: AtomicUsize,
    idle: Duration,
}

impl ScriptedTranscriber {
    pub fn new(script: Vec<RecognitionResult>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            idle: Duration::from_secs(60),
        })
    }

    /// Script of successful transcriptions
    pub fn heard(texts: &[&str]) -> Arc<Self> {
        Self::new(
            texts
                .iter()
                .map(|t| RecognitionResult::heard(*t, 0.9, Duration::from_secs(1)))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn adjust_for_ambient_noise(&self, _duration: Duration) -> bool {
        true
    }

    async fn listen(&self, duration: Duration) -> RecognitionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => {
                tokio::time::sleep(self.idle).await;
                RecognitionResult::silence(duration)
            }
        }
    }
}

/// Provider that records every action and succeeds
#[derive(Default)]
pub struct RecordingProvider {
    actions: Mutex<Vec<Action>>,
}

impl RecordingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionProvider for RecordingProvider {
    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        self.actions.lock().unwrap().push(action.clone());
        let outcome = match action {
            Action::ReportTime => ActionOutcome::ok().with("time", "09:41 AM"),
            Action::Screenshot => ActionOutcome::ok().with("path", "/tmp/screenshot.png"),
            _ => ActionOutcome::ok(),
        };
        Ok(outcome)
    }
}

/// Provider whose capabilities ran but did not succeed
pub struct FailingProvider;

#[async_trait]
impl ActionProvider for FailingProvider {
    async fn execute(&self, _action: &Action) -> Result<ActionOutcome, ActionError> {
        Ok(ActionOutcome::failed())
    }
}

/// Provider with no capabilities at all
pub struct UnavailableProvider;

#[async_trait]
impl ActionProvider for UnavailableProvider {
    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        Err(ActionError::Unavailable(action.name().to_string()))
    }
}

/// Provider that panics on every call
pub struct PanickingProvider;

#[async_trait]
impl ActionProvider for PanickingProvider {
    async fn execute(&self, action: &Action) -> Result<ActionOutcome, ActionError> {
        panic!("{} exploded", action.name());
    }
}

/// Dispatcher over `provider` with default settings
pub fn dispatcher(provider: Arc<dyn ActionProvider>) -> ActionDispatcher {
    ActionDispatcher::new(provider, DispatchSettings::default())
}

/// Chat that replays scripted replies and records what it was sent
pub struct StubChat {
    replies: Mutex<VecDeque<Result<String, ChatError>>>,
    sent: Mutex<Vec<Vec<ChatMessage>>>,
}

impl StubChat {
    pub fn new(replies: Vec<Result<String, ChatError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Chat whose endpoint is never reachable
    pub fn unreachable(times: usize) -> Arc<Self> {
        Self::new(
            (0..times)
                .map(|_| Err(ChatError::Connection("connection refused".to_string())))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<Vec<ChatMessage>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Chat for StubChat {
    async fn send(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        self.sent.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ChatError::Other("no scripted reply".to_string())))
    }
}

/// Speaker that records what it was asked to say
#[derive(Default)]
pub struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> bool {
        self.spoken.lock().unwrap().push(text.to_string());
        true
    }
}

/// Everything queued on the channel right now
pub fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}

/// Only the log lines of `notifications`
pub fn logs(notifications: &[Notification]) -> Vec<String> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::Log(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// A connected notifier and receiver
pub fn channel() -> (Notifier, UnboundedReceiver<Notification>) {
    Notifier::channel()
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
