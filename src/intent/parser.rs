//! Keyword + pattern intent parser
//!
//! Scores every entry of a fixed, ordered definition table against the
//! normalized utterance:
//!
//! ```text
//! keyword_score = matched_keywords / max(1, total_keywords)
//! pattern_score = 0.9 if any pattern matches, else 0
//! confidence    = (keyword_score + pattern_score) / 2
//! ```
//!
//! The entry with the strictly greatest confidence wins, so on a tie the
//! entry declared first wins. Table order is part of the contract.

use std::sync::LazyLock;

use regex::Regex;

use super::{Entity, Intent, IntentKind};

/// Score awarded when any extraction pattern matches
pub const PATTERN_SCORE: f32 = 0.9;

/// Confidence attached to every extracted entity
const ENTITY_CONFIDENCE: f32 = 0.9;

/// One row of the intent table
#[derive(Debug)]
pub struct IntentDefinition {
    /// Kind produced when this row wins
    pub kind: IntentKind,
    /// Substrings counted towards the keyword score
    pub keywords: &'static [&'static str],
    /// Extraction patterns, tried in order; the first match wins
    pub patterns: Vec<Regex>,
    /// Entity role for each capture group, positionally
    pub entity_roles: &'static [&'static str],
}

impl IntentDefinition {
    fn new(
        kind: IntentKind,
        keywords: &'static [&'static str],
        patterns: &[&str],
        entity_roles: &'static [&'static str],
    ) -> Self {
        Self {
            kind,
            keywords,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("valid regex"))
                .collect(),
            entity_roles,
        }
    }

    /// Fraction of keywords present in `text`, clamped to `[0, 1]`
    #[allow(clippy::cast_precision_loss)]
    fn keyword_score(&self, text: &str) -> f32 {
        let matched = self.keywords.iter().filter(|kw| text.contains(*kw)).count();
        (matched as f32 / self.keywords.len().max(1) as f32).clamp(0.0, 1.0)
    }

    /// Run the extraction patterns, returning entities and the pattern score
    fn extract(&self, text: &str) -> (Vec<Entity>, f32) {
        for pattern in &self.patterns {
            let Some(captures) = pattern.captures(text) else {
                continue;
            };

            let entities = captures
                .iter()
                .skip(1)
                .zip(self.entity_roles)
                .filter_map(|(group, role)| {
                    let value = group?.as_str().trim();
                    (!value.is_empty()).then(|| Entity {
                        entity_type: (*role).to_string(),
                        value: value.to_string(),
                        confidence: ENTITY_CONFIDENCE,
                    })
                })
                .collect();

            return (entities, PATTERN_SCORE);
        }

        (Vec::new(), 0.0)
    }
}

static DEFINITIONS: LazyLock<Vec<IntentDefinition>> = LazyLock::new(|| {
    use IntentKind as K;

    vec![
        IntentDefinition::new(
            K::OpenApp,
            &["open", "launch", "start"],
            &[r"(?:open|launch|start)\s+(.+)"],
            &["app_name"],
        ),
        IntentDefinition::new(
            K::CloseApp,
            &["close", "quit", "exit"],
            &[r"(?:close|quit|exit)\s+(.+)"],
            &["app_name"],
        ),
        IntentDefinition::new(
            K::Search,
            &["search", "find", "google"],
            &[r"(?:search|find|google)\s+(?:for\s+)?(.+)"],
            &["query"],
        ),
        IntentDefinition::new(K::PlayMusic, &["play", "music"], &[r"play\s+(.+)"], &["song_name"]),
        IntentDefinition::new(
            K::SetTimer,
            &["timer", "set timer"],
            &[r"timer\s+for\s+(\d+)\s*(seconds?|minutes?|hours?)"],
            &["duration", "unit"],
        ),
        IntentDefinition::new(
            K::GetWeather,
            &["weather", "temperature"],
            &[r"weather(?:\s+in\s+(.+))?"],
            &["location"],
        ),
        IntentDefinition::new(
            K::GetTime,
            &["time", "what time"],
            &[r"(?:what's|what is)\s+the\s+time"],
            &[],
        ),
        IntentDefinition::new(K::VolumeUp, &["volume up", "louder"], &[r"volume\s+up"], &[]),
        IntentDefinition::new(K::VolumeDown, &["volume down", "quieter"], &[r"volume\s+down"], &[]),
        IntentDefinition::new(K::Shutdown, &["shutdown", "shut down"], &[r"shut\s*down"], &[]),
        IntentDefinition::new(
            K::TakeScreenshot,
            &["screenshot", "screen capture"],
            &[r"(?:take|capture)\s+(?:a\s+)?screenshot"],
            &[],
        ),
        IntentDefinition::new(K::Mute, &["mute", "silence"], &[r"\bmute\b"], &[]),
        IntentDefinition::new(K::Unmute, &["unmute"], &[r"\bunmute\b"], &[]),
        IntentDefinition::new(
            K::LockScreen,
            &["lock", "lock screen"],
            &[r"lock\s+(?:the\s+)?(?:screen|computer)"],
            &[],
        ),
        IntentDefinition::new(
            K::NextTrack,
            &["next", "skip"],
            &[r"(?:next|skip)\s+(?:the\s+)?(?:track|song)"],
            &[],
        ),
        IntentDefinition::new(
            K::PreviousTrack,
            &["previous", "last song"],
            &[r"previous\s+(?:track|song)", r"(?:last|prior)\s+song"],
            &[],
        ),
    ]
});

/// The built-in definition table, in tie-break order
#[must_use]
pub fn definitions() -> &'static [IntentDefinition] {
    &DEFINITIONS
}

/// Classifies utterances against an ordered definition table
#[derive(Debug, Clone, Copy)]
pub struct IntentParser {
    definitions: &'static [IntentDefinition],
}

impl Default for IntentParser {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentParser {
    /// Create a parser over the built-in table
    #[must_use]
    pub fn new() -> Self {
        Self {
            definitions: definitions(),
        }
    }

    /// Classify `text`
    ///
    /// Never fails: empty or unmatched input yields an `UNKNOWN` intent with
    /// zero confidence.
    #[must_use]
    pub fn parse(&self, text: &str) -> Intent {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return Intent::unknown(text);
        }

        let mut best: Option<(IntentKind, f32, Vec<Entity>)> = None;
        let mut best_confidence = 0.0_f32;

        for definition in self.definitions {
            let keyword_score = definition.keyword_score(&normalized);
            if keyword_score <= 0.0 {
                continue;
            }

            let (entities, pattern_score) = definition.extract(&normalized);
            let confidence = (keyword_score + pattern_score) / 2.0;

            if confidence > best_confidence {
                best_confidence = confidence;
                best = Some((definition.kind, confidence, entities));
            }
        }

        let Some((kind, confidence, entities)) = best else {
            tracing::debug!(text = %normalized, "no intent matched");
            return Intent::unknown(text);
        };

        tracing::debug!(intent = %kind, confidence, entities = entities.len(), "intent parsed");

        Intent {
            kind,
            confidence,
            raw_text: text.to_string(),
            entities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_score_is_fraction_of_keywords() {
        let def = &definitions()[0];
        assert!((def.keyword_score("open chrome") - 1.0 / 3.0).abs() < 1e-6);
        assert!((def.keyword_score("open or launch") - 2.0 / 3.0).abs() < 1e-6);
        assert!(def.keyword_score("hello").abs() < f32::EPSILON);
    }

    #[test]
    fn test_extract_maps_groups_to_roles() {
        let timer = definitions()
            .iter()
            .find(|d| d.kind == IntentKind::SetTimer)
            .unwrap();

        let (entities, score) = timer.extract("set a timer for 5 minutes");
        assert!((score - PATTERN_SCORE).abs() < f32::EPSILON);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_type, "duration");
        assert_eq!(entities[0].value, "5");
        assert_eq!(entities[1].entity_type, "unit");
        assert_eq!(entities[1].value, "minutes");
    }

    #[test]
    fn test_optional_group_yields_no_entity() {
        let weather = definitions()
            .iter()
            .find(|d| d.kind == IntentKind::GetWeather)
            .unwrap();

        let (entities, score) = weather.extract("what's the weather");
        assert!(score > 0.0);
        assert!(entities.is_empty());
    }

    #[test]
    fn test_table_order_starts_with_open_app() {
        let kinds: Vec<_> = definitions().iter().map(|d| d.kind).collect();
        assert_eq!(kinds[0], IntentKind::OpenApp);
        assert_eq!(kinds[1], IntentKind::CloseApp);
        assert!(!kinds.contains(&IntentKind::Unknown));
    }

    #[test]
    fn test_roles_cover_required_entities() {
        for def in definitions() {
            for required in def.kind.required_entities() {
                assert!(
                    def.entity_roles.contains(required),
                    "{} must declare role {required}",
                    def.kind
                );
            }
        }
    }
}
