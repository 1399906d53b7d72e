//! Wake word monitor tests with a scripted transcriber

use std::sync::{Arc, Mutex};
use std::time::Duration;

use spark_assistant::voice::{
    ActivationEvent, MonitorState, RecognitionResult, WakeWordMonitor, WakeWordSettings,
};

mod common;

use common::{ScriptedTranscriber, eventually};

const WAIT: Duration = Duration::from_secs(2);

fn fast_settings() -> WakeWordSettings {
    WakeWordSettings {
        cooldown: Duration::from_millis(10),
        error_backoff: Duration::from_millis(10),
        join_timeout: Duration::from_millis(100),
        ..WakeWordSettings::default()
    }
}

/// Monitor with a listener that collects every event
fn collecting(
    transcriber: Arc<ScriptedTranscriber>,
    settings: WakeWordSettings,
) -> (WakeWordMonitor, Arc<Mutex<Vec<ActivationEvent>>>) {
    let monitor = WakeWordMonitor::new(transcriber, settings);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    monitor.add_listener(Arc::new(move |event: &ActivationEvent| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    }));
    (monitor, events)
}

#[tokio::test]
async fn test_single_match_emits_one_event_then_listens() {
    let transcriber = ScriptedTranscriber::heard(&["hey assistant"]);
    let (monitor, events) = collecting(transcriber.clone(), fast_settings());

    assert!(monitor.start());
    assert!(eventually(WAIT, || events.lock().unwrap().len() == 1).await);
    assert!(eventually(WAIT, || transcriber.calls() >= 2).await);
    assert_eq!(monitor.status().state, MonitorState::Listening);

    let event = events.lock().unwrap()[0].clone();
    assert_eq!(event.trigger_phrase, "hey assistant");
    assert_eq!(event.transcript, "hey assistant");
    assert!((event.confidence - 0.8).abs() < f32::EPSILON);
    assert_eq!(event.command(), None);

    monitor.stop().await;
    assert!(!monitor.is_running());
    assert_eq!(monitor.status().state, MonitorState::Idle);
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_matching_chunks_are_skipped() {
    let transcriber = ScriptedTranscriber::heard(&["what's up", "Computer, open chrome"]);
    let (monitor, events) = collecting(transcriber, fast_settings());

    monitor.start();
    assert!(eventually(WAIT, || !events.lock().unwrap().is_empty()).await);
    monitor.stop().await;

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].trigger_phrase, "computer");
    assert_eq!(events[0].command().as_deref(), Some("open chrome"));
}

#[tokio::test]
async fn test_transcription_errors_back_off_and_continue() {
    let transcriber = ScriptedTranscriber::new(vec![
        RecognitionResult::failed("network connection error", Duration::from_secs(2)),
        RecognitionResult::heard("hey assistant", 0.9, Duration::from_secs(2)),
    ]);
    let (monitor, events) = collecting(transcriber, fast_settings());

    monitor.start();
    assert!(eventually(WAIT, || events.lock().unwrap().len() == 1).await);
    monitor.stop().await;
}

#[tokio::test]
async fn test_threshold_above_activation_confidence_suppresses_events() {
    let transcriber = ScriptedTranscriber::heard(&["computer"]);
    let settings = WakeWordSettings {
        confidence_threshold: 0.9,
        ..fast_settings()
    };
    let (monitor, events) = collecting(transcriber.clone(), settings);

    monitor.start();
    assert!(eventually(WAIT, || transcriber.calls() >= 2).await);
    monitor.stop().await;

    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_panicking_listener_does_not_stop_detection() {
    let transcriber = ScriptedTranscriber::heard(&["computer", "computer"]);
    let monitor = WakeWordMonitor::new(transcriber, fast_settings());
    let count = Arc::new(Mutex::new(0_usize));

    monitor.add_listener(Arc::new(|_: &ActivationEvent| -> Result<(), String> {
        panic!("listener bug")
    }));
    let counter = Arc::clone(&count);
    monitor.add_listener(Arc::new(move |_: &ActivationEvent| {
        *counter.lock().unwrap() += 1;
        Ok(())
    }));

    monitor.start();
    assert!(eventually(WAIT, || *count.lock().unwrap() == 2).await);
    assert!(monitor.is_running());
    monitor.stop().await;
}

#[tokio::test]
async fn test_start_is_idempotent_and_restartable() {
    let transcriber = ScriptedTranscriber::new(Vec::new());
    let monitor = WakeWordMonitor::new(transcriber.clone(), fast_settings());

    assert!(monitor.start());
    assert!(monitor.start());
    assert!(eventually(WAIT, || transcriber.calls() == 1).await);

    monitor.stop().await;
    assert!(!monitor.is_running());

    assert!(monitor.start());
    assert!(eventually(WAIT, || transcriber.calls() == 2).await);
    assert_eq!(monitor.status().state, MonitorState::Listening);
    monitor.stop().await;
}
