//! Intent classification
//!
//! Turns a single utterance into a typed [`Intent`] with extracted
//! [`Entity`] values. Classification is pure: no state, no I/O.

mod parser;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use parser::{IntentDefinition, IntentParser, PATTERN_SCORE, definitions};

/// Classified user goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    OpenApp,
    CloseApp,
    Search,
    PlayMusic,
    SetTimer,
    GetWeather,
    GetTime,
    VolumeUp,
    VolumeDown,
    Shutdown,
    TakeScreenshot,
    Mute,
    Unmute,
    LockScreen,
    NextTrack,
    PreviousTrack,
    Unknown,
}

impl IntentKind {
    /// Every kind, in declaration order
    pub const ALL: [Self; 17] = [
        Self::OpenApp,
        Self::CloseApp,
        Self::Search,
        Self::PlayMusic,
        Self::SetTimer,
        Self::GetWeather,
        Self::GetTime,
        Self::VolumeUp,
        Self::VolumeDown,
        Self::Shutdown,
        Self::TakeScreenshot,
        Self::Mute,
        Self::Unmute,
        Self::LockScreen,
        Self::NextTrack,
        Self::PreviousTrack,
        Self::Unknown,
    ];

    /// Stable identifier used in logs and observer payloads
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenApp => "open_app",
            Self::CloseApp => "close_app",
            Self::Search => "search",
            Self::PlayMusic => "play_music",
            Self::SetTimer => "set_timer",
            Self::GetWeather => "get_weather",
            Self::GetTime => "get_time",
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
            Self::Shutdown => "shutdown",
            Self::TakeScreenshot => "take_screenshot",
            Self::Mute => "mute",
            Self::Unmute => "unmute",
            Self::LockScreen => "lock_screen",
            Self::NextTrack => "next_track",
            Self::PreviousTrack => "previous_track",
            Self::Unknown => "unknown",
        }
    }

    /// Entity roles a handler for this kind cannot work without
    #[must_use]
    pub const fn required_entities(self) -> &'static [&'static str] {
        match self {
            Self::OpenApp | Self::CloseApp => &["app_name"],
            Self::Search => &["query"],
            Self::SetTimer => &["duration", "unit"],
            _ => &[],
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named, typed value extracted from an utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity role (e.g. `"app_name"`)
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Extracted text, trimmed
    pub value: String,
    /// Extraction confidence in `0..=1`
    pub confidence: f32,
}

/// Classified utterance
///
/// Built once per utterance by [`IntentParser::parse`] and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Classified kind
    #[serde(rename = "type")]
    pub kind: IntentKind,
    /// Classification confidence in `0..=1`
    pub confidence: f32,
    /// Utterance exactly as submitted
    pub raw_text: String,
    /// Extracted entities, in the order of the definition's roles
    pub entities: Vec<Entity>,
}

impl Intent {
    /// An `UNKNOWN` intent with zero confidence
    #[must_use]
    pub fn unknown(raw_text: &str) -> Self {
        Self {
            kind: IntentKind::Unknown,
            confidence: 0.0,
            raw_text: raw_text.to_string(),
            entities: Vec::new(),
        }
    }

    /// First entity with the given role
    #[must_use]
    pub fn entity(&self, entity_type: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.entity_type == entity_type)
    }

    /// Value of the first entity with the given role
    #[must_use]
    pub fn entity_value(&self, entity_type: &str) -> Option<&str> {
        self.entity(entity_type).map(|e| e.value.as_str())
    }

    /// Whether this intent is `UNKNOWN`
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.kind == IntentKind::Unknown
    }
}
