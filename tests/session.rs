//! Command session tests: retries, chat fallback and the chat breaker

use std::sync::Arc;
use std::time::Duration;

use spark_assistant::chat::{ChatError, Role};
use spark_assistant::intent::IntentKind;
use spark_assistant::pipeline::{
    ChatBreaker, CommandSession, Notification, PipelineState, SessionSettings, SharedState,
    TranscriptionFailure,
};
use spark_assistant::voice::RecognitionResult;

mod common;

use common::{
    RecordingProvider, RecordingSpeaker, ScriptedTranscriber, StubChat, channel, dispatcher, drain,
    logs,
};

const RETRY: &str = "Didn't catch that, trying again...";
const NOT_UNDERSTOOD: &str = "I didn't understand that command";

fn settings(retry_count: u32) -> SessionSettings {
    SessionSettings {
        retry_count,
        ..SessionSettings::default()
    }
}

fn session(
    transcriber: Arc<ScriptedTranscriber>,
    provider: Arc<RecordingProvider>,
    settings: SessionSettings,
) -> (
    CommandSession,
    SharedState,
    tokio::sync::mpsc::UnboundedReceiver<Notification>,
) {
    let (notifier, rx) = channel();
    let state = SharedState::new(PipelineState::new(settings.history_window));
    let session = CommandSession::new(
        transcriber,
        Arc::new(dispatcher(provider)),
        state.clone(),
        notifier,
        settings,
    );
    (session, state, rx)
}

fn failed(error: &str) -> RecognitionResult {
    RecognitionResult::failed(error, Duration::from_secs(1))
}

#[tokio::test]
async fn test_voice_command_dispatches() {
    let transcriber = ScriptedTranscriber::heard(&["open chrome"]);
    let provider = RecordingProvider::new();
    let (session, state, mut rx) = session(transcriber.clone(), provider.clone(), settings(1));

    let result = session.run(Duration::from_secs(5)).await.unwrap();
    assert!(result.success);
    assert_eq!(result.message, "Opened chrome");
    assert_eq!(transcriber.calls(), 1);
    assert_eq!(provider.actions().len(), 1);

    let notifications = drain(&mut rx);
    assert!(notifications.iter().any(|n| matches!(n, Notification::Intent(i) if i.kind == IntentKind::OpenApp)));
    assert!(notifications.iter().any(|n| matches!(n, Notification::Result(r) if r.success)));
    assert!(logs(&notifications).contains(&"You: open chrome".to_string()));
    assert!(logs(&notifications).contains(&"Spark: Opened chrome".to_string()));

    let history = state.lock().history.snapshot();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_retry_then_success() {
    let transcriber = ScriptedTranscriber::new(vec![
        RecognitionResult::silence(Duration::from_secs(1)),
        RecognitionResult::heard("mute", 0.9, Duration::from_secs(1)),
    ]);
    let (session, _, mut rx) = session(transcriber.clone(), RecordingProvider::new(), settings(1));

    let result = session.run(Duration::from_secs(5)).await.unwrap();
    assert_eq!(result.message, "Audio muted");
    assert_eq!(transcriber.calls(), 2);

    let retries = logs(&drain(&mut rx)).iter().filter(|l| *l == RETRY).count();
    assert_eq!(retries, 1);
}

#[tokio::test]
async fn test_exhausted_retries_make_n_plus_one_attempts() {
    for retry_count in [0_u32, 1, 3] {
        let script = (0..=retry_count).map(|_| failed("request timeout: deadline")).collect();
        let transcriber = ScriptedTranscriber::new(script);
        let provider = RecordingProvider::new();
        let (session, _, mut rx) =
            session(transcriber.clone(), provider.clone(), settings(retry_count));

        assert!(session.run(Duration::from_secs(1)).await.is_none());
        assert_eq!(transcriber.calls(), retry_count as usize + 1);
        assert!(provider.actions().is_empty());

        let lines = logs(&drain(&mut rx));
        let retries = lines.iter().filter(|l| *l == RETRY).count();
        assert_eq!(retries, retry_count as usize);
        assert_eq!(lines.last().map(String::as_str), Some(TranscriptionFailure::Timeout.notice()));
    }
}

#[tokio::test]
async fn test_final_notice_follows_last_error() {
    let cases = [
        ("network connection error: refused", TranscriptionFailure::Network),
        ("microphone error: no input device", TranscriptionFailure::Device),
        ("something odd", TranscriptionFailure::Other),
    ];

    for (error, expected) in cases {
        let transcriber = ScriptedTranscriber::new(vec![failed(error)]);
        let (session, _, mut rx) = session(transcriber, RecordingProvider::new(), settings(0));

        assert!(session.run(Duration::from_secs(1)).await.is_none());
        let lines = logs(&drain(&mut rx));
        assert_eq!(lines.last().map(String::as_str), Some(expected.notice()), "{error}");
    }
}

#[tokio::test]
async fn test_text_command_skips_transcriber() {
    let transcriber = ScriptedTranscriber::new(Vec::new());
    let (session, _, _rx) = session(transcriber.clone(), RecordingProvider::new(), settings(1));

    let result = session.run_text("volume up").await.unwrap();
    assert_eq!(result.message, "Volume increased");
    assert_eq!(transcriber.calls(), 0);
}

#[tokio::test]
async fn test_blank_text_is_ignored() {
    let provider = RecordingProvider::new();
    let (session, state, mut rx) =
        session(ScriptedTranscriber::new(Vec::new()), provider.clone(), settings(1));

    assert!(session.run_text("   ").await.is_none());
    assert!(provider.actions().is_empty());
    assert!(state.lock().history.is_empty());
    assert_eq!(logs(&drain(&mut rx)), vec!["Nothing to process".to_string()]);
}

#[tokio::test]
async fn test_unknown_without_chat_emits_notice() {
    let (session, _, mut rx) =
        session(ScriptedTranscriber::new(Vec::new()), RecordingProvider::new(), settings(1));

    assert!(session.run_text("tell me a joke").await.is_none());
    assert!(logs(&drain(&mut rx)).contains(&NOT_UNDERSTOOD.to_string()));
}

#[tokio::test]
async fn test_chat_fallback_sends_system_prompt_and_history() {
    let chat = StubChat::new(vec![Ok("Why did the crab never share? Because it's shellfish.".to_string())]);
    let speaker = RecordingSpeaker::new();
    let (session, state, _rx) =
        session(ScriptedTranscriber::new(Vec::new()), RecordingProvider::new(), settings(1));
    let session = session
        .with_chat(chat.clone(), ChatBreaker::new())
        .with_speaker(speaker.clone());

    let result = session.run_text("tell me a joke").await.unwrap();
    assert!(result.success);
    assert_eq!(result.intent_kind, IntentKind::Unknown);
    assert_eq!(result.extras["source"], "chat");

    let sent = chat.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0].role, Role::System);
    assert_eq!(sent[0].last().unwrap().content, "tell me a joke");

    assert_eq!(speaker.spoken(), vec![result.message.clone()]);
    assert_eq!(state.lock().history.len(), 2);
}

#[tokio::test]
async fn test_dispatched_commands_never_reach_chat() {
    let chat = StubChat::new(Vec::new());
    let (session, _, _rx) =
        session(ScriptedTranscriber::new(Vec::new()), RecordingProvider::new(), settings(1));
    let session = session.with_chat(chat.clone(), ChatBreaker::new());

    session.run_text("open chrome").await.unwrap();
    assert_eq!(chat.calls(), 0);
}

#[tokio::test]
async fn test_unreachable_chat_trips_breaker_once() {
    let chat = StubChat::unreachable(5);
    let breaker = ChatBreaker::new();
    let (session, _, mut rx) =
        session(ScriptedTranscriber::new(Vec::new()), RecordingProvider::new(), settings(1));
    let session = session.with_chat(chat.clone(), breaker.clone());

    for _ in 0..3 {
        assert!(session.run_text("tell me a joke").await.is_none());
    }

    assert!(breaker.is_open());
    assert_eq!(chat.calls(), 1);

    let lines = logs(&drain(&mut rx));
    let unreachable = lines.iter().filter(|l| l.starts_with("Local LLM is not reachable")).count();
    assert_eq!(unreachable, 1);
    assert_eq!(lines.iter().filter(|l| *l == NOT_UNDERSTOOD).count(), 2);
}

#[tokio::test]
async fn test_other_chat_errors_leave_breaker_closed() {
    let chat = StubChat::new(vec![
        Err(ChatError::Other("status 500".to_string())),
        Ok("Sure.".to_string()),
    ]);
    let breaker = ChatBreaker::new();
    let (session, _, mut rx) =
        session(ScriptedTranscriber::new(Vec::new()), RecordingProvider::new(), settings(1));
    let session = session.with_chat(chat.clone(), breaker.clone());

    assert!(session.run_text("tell me a joke").await.is_none());
    assert!(!breaker.is_open());
    assert!(logs(&drain(&mut rx)).contains(&"LLM error: status 500".to_string()));

    let result = session.run_text("tell me another").await.unwrap();
    assert_eq!(result.message, "Sure.");
    assert_eq!(chat.calls(), 2);
}

#[tokio::test]
async fn test_low_confidence_intent_falls_back() {
    // "start" alone only matches one keyword and no pattern
    let chat = StubChat::new(vec![Ok("Start what?".to_string())]);
    let provider = RecordingProvider::new();
    let (session, _, _rx) =
        session(ScriptedTranscriber::new(Vec::new()), provider.clone(), settings(1));
    let session = session.with_chat(chat.clone(), ChatBreaker::new());

    let result = session.run_text("start").await.unwrap();
    assert_eq!(result.message, "Start what?");
    assert!(result.success);
    assert_eq!(result.intent_kind, IntentKind::Unknown);
    assert_eq!(result.extras["source"], "chat");
    assert_eq!(result.extras["parsed_intent"], "open_app");
    assert!(provider.actions().is_empty());
}
