//! Intent classification tests

use spark_assistant::intent::{IntentKind, IntentParser};

fn parse(text: &str) -> spark_assistant::Intent {
    IntentParser::new().parse(text)
}

#[test]
fn test_open_app_extracts_name() {
    let intent = parse("Open Chrome");
    assert_eq!(intent.kind, IntentKind::OpenApp);
    assert_eq!(intent.entity_value("app_name"), Some("chrome"));
    assert_eq!(intent.raw_text, "Open Chrome");
    // one of three keywords plus a pattern hit
    assert!((intent.confidence - (1.0 / 3.0 + 0.9) / 2.0).abs() < 1e-5);
}

#[test]
fn test_search_strips_for() {
    let intent = parse("search for rust tutorials");
    assert_eq!(intent.kind, IntentKind::Search);
    assert_eq!(intent.entity_value("query"), Some("rust tutorials"));
}

#[test]
fn test_timer_entities() {
    let intent = parse("set a timer for 10 seconds");
    assert_eq!(intent.kind, IntentKind::SetTimer);
    assert_eq!(intent.entity_value("duration"), Some("10"));
    assert_eq!(intent.entity_value("unit"), Some("seconds"));
}

#[test]
fn test_weather_location_is_optional() {
    let intent = parse("what's the weather in Paris");
    assert_eq!(intent.kind, IntentKind::GetWeather);
    assert_eq!(intent.entity_value("location"), Some("paris"));

    let intent = parse("weather");
    assert_eq!(intent.kind, IntentKind::GetWeather);
    assert!(intent.entities.is_empty());
}

#[test]
fn test_time_question_without_pattern_still_dispatchable() {
    let intent = parse("what time is it");
    assert_eq!(intent.kind, IntentKind::GetTime);
    assert!((intent.confidence - 0.5).abs() < 1e-6);
}

#[test]
fn test_unmute_beats_mute() {
    assert_eq!(parse("unmute").kind, IntentKind::Unmute);
    assert_eq!(parse("mute").kind, IntentKind::Mute);
}

#[test]
fn test_media_and_system_commands() {
    let cases = [
        ("volume up", IntentKind::VolumeUp),
        ("turn the volume down", IntentKind::VolumeDown),
        ("shut down", IntentKind::Shutdown),
        ("take a screenshot", IntentKind::TakeScreenshot),
        ("lock the screen", IntentKind::LockScreen),
        ("next track", IntentKind::NextTrack),
        ("previous song", IntentKind::PreviousTrack),
        ("play some jazz", IntentKind::PlayMusic),
        ("close spotify", IntentKind::CloseApp),
    ];

    for (text, expected) in cases {
        assert_eq!(parse(text).kind, expected, "{text}");
    }
}

#[test]
fn test_unmatched_and_empty_input_are_unknown() {
    for text in ["", "   ", "hello there", "tell me a joke"] {
        let intent = parse(text);
        assert!(intent.is_unknown(), "{text:?}");
        assert!(intent.confidence.abs() < f32::EPSILON);
        assert!(intent.entities.is_empty());
        assert_eq!(intent.raw_text, text);
    }
}

#[test]
fn test_confidence_is_bounded() {
    for text in ["open open launch start chrome", "unmute unmute", "volume up louder"] {
        let intent = parse(text);
        assert!((0.0..=1.0).contains(&intent.confidence), "{text}");
    }
}

#[test]
fn test_intent_serializes_type_in_snake_case() {
    let json = serde_json::to_value(parse("open chrome")).unwrap();
    assert_eq!(json["type"], "open_app");
    assert_eq!(json["entities"][0]["type"], "app_name");
    assert_eq!(json["entities"][0]["value"], "chrome");
}
