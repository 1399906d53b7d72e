//! Intent → action routing

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Action, ActionProvider, timer_seconds, validate_app_name};
use crate::intent::{Intent, IntentKind};

/// Message returned for `UNKNOWN` intents
const NOT_UNDERSTOOD: &str = "I didn't understand that command";

/// Terminal result of handling one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Whether the request was carried out
    pub success: bool,
    /// Human-readable outcome, suitable for speech
    pub message: String,
    /// Kind of the intent that produced this result
    pub intent_kind: IntentKind,
    /// Handler-specific fields (e.g. `app_name`, `time`)
    #[serde(default)]
    pub extras: Map<String, Value>,
}

impl DispatchResult {
    /// Successful result
    #[must_use]
    pub fn success(intent_kind: IntentKind, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            intent_kind,
            extras: Map::new(),
        }
    }

    /// Failed result
    #[must_use]
    pub fn failure(intent_kind: IntentKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            intent_kind,
            extras: Map::new(),
        }
    }

    /// Attach an extra field
    #[must_use]
    pub fn with_extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extras.insert(key.to_string(), value.into());
        self
    }
}

/// Dispatcher policy knobs
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Allow the `SHUTDOWN` intent to reach the provider
    pub allow_shutdown: bool,
    /// Volume change per request, in percent
    pub volume_step: u8,
    /// Intent kinds with no registered handler
    pub disabled: Vec<IntentKind>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            allow_shutdown: false,
            volume_step: 10,
            disabled: Vec::new(),
        }
    }
}

/// What a handler decided to do, before the provider is called
struct Plan {
    action: Action,
    /// Success message; `{key}` is replaced by provider data
    success: String,
    failure: String,
    extras: Map<String, Value>,
}

impl Plan {
    fn new(action: Action, success: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            action,
            success: success.into(),
            failure: failure.into(),
            extras: Map::new(),
        }
    }

    fn extra(mut self, key: &str, value: &str) -> Self {
        self.extras.insert(key.to_string(), Value::from(value));
        self
    }
}

/// A handler either plans one provider call or fails with a message
type Handler = fn(&Intent, &DispatchSettings) -> Result<Plan, String>;

const HANDLERS: &[(IntentKind, Handler)] = &[
    (IntentKind::OpenApp, handle_open_app),
    (IntentKind::CloseApp, handle_close_app),
    (IntentKind::Search, handle_search),
    (IntentKind::PlayMusic, handle_play_music),
    (IntentKind::SetTimer, handle_set_timer),
    (IntentKind::GetWeather, handle_get_weather),
    (IntentKind::GetTime, handle_get_time),
    (IntentKind::VolumeUp, handle_volume_up),
    (IntentKind::VolumeDown, handle_volume_down),
    (IntentKind::Shutdown, handle_shutdown),
    (IntentKind::TakeScreenshot, handle_screenshot),
    (IntentKind::Mute, handle_mute),
    (IntentKind::Unmute, handle_unmute),
    (IntentKind::LockScreen, handle_lock_screen),
    (IntentKind::NextTrack, handle_next_track),
    (IntentKind::PreviousTrack, handle_previous_track),
];

/// Routes intents to handlers backed by an [`ActionProvider`]
///
/// `dispatch` never panics and never returns an error: every failure,
/// including a panicking provider, becomes a `DispatchResult` with
/// `success == false`.
pub struct ActionDispatcher {
    provider: Arc<dyn ActionProvider>,
    handlers: HashMap<IntentKind, Handler>,
    settings: DispatchSettings,
}

impl ActionDispatcher {
    /// Create a dispatcher over `provider`
    #[must_use]
    pub fn new(provider: Arc<dyn ActionProvider>, settings: DispatchSettings) -> Self {
        let handlers = HANDLERS
            .iter()
            .filter(|(kind, _)| !settings.disabled.contains(kind))
            .copied()
            .collect();

        Self {
            provider,
            handlers,
            settings,
        }
    }

    /// Whether `kind` has a registered handler
    #[must_use]
    pub fn handles(&self, kind: IntentKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Handle one intent
    pub async fn dispatch(&self, intent: &Intent) -> DispatchResult {
        let kind = intent.kind;
        tracing::info!(intent = %kind, confidence = intent.confidence, "dispatching intent");

        if intent.is_unknown() {
            return DispatchResult::failure(kind, NOT_UNDERSTOOD);
        }

        let Some(handler) = self.handlers.get(&kind) else {
            tracing::warn!(intent = %kind, "no handler registered");
            return DispatchResult::failure(kind, format!("Action for '{kind}' is not available"));
        };

        let plan = match handler(intent, &self.settings) {
            Ok(plan) => plan,
            Err(message) => {
                tracing::debug!(intent = %kind, %message, "handler rejected intent");
                return DispatchResult::failure(kind, message);
            }
        };

        let capability = plan.action.name();
        let call = AssertUnwindSafe(self.provider.execute(&plan.action)).catch_unwind();

        let mut result = match call.await {
            Ok(Ok(outcome)) if outcome.success => {
                let message = render(&plan.success, &outcome.data);
                let mut result = DispatchResult::success(kind, message);
                result.extras.extend(outcome.data);
                result
            }
            Ok(Ok(outcome)) => {
                tracing::warn!(capability, "action reported failure");
                let mut result = DispatchResult::failure(kind, plan.failure);
                result.extras.extend(outcome.data);
                result
            }
            Ok(Err(e)) => {
                tracing::error!(capability, error = %e, "action failed");
                DispatchResult::failure(kind, format!("Error executing command: {e}"))
            }
            Err(_) => {
                tracing::error!(capability, "action provider panicked");
                DispatchResult::failure(kind, format!("Error executing command: {capability} crashed"))
            }
        };

        result.extras.extend(plan.extras);
        result
    }
}

/// Substitute `{key}` placeholders with string values from `data`
fn render(template: &str, data: &Map<String, Value>) -> String {
    data.iter().fold(template.to_string(), |acc, (key, value)| {
        let value = value.as_str().map_or_else(|| value.to_string(), ToString::to_string);
        acc.replace(&format!("{{{key}}}"), &value)
    })
}

/// Look up a required entity, failing with `missing` when absent
fn required<'a>(intent: &'a Intent, role: &str, missing: &str) -> Result<&'a str, String> {
    intent
        .entity_value(role)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| missing.to_string())
}

fn handle_open_app(intent: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    let app = validate_app_name(required(intent, "app_name", "No app name specified")?)?;
    Ok(Plan::new(
        Action::OpenApp {
            app_name: app.to_string(),
        },
        format!("Opened {app}"),
        format!("Failed to open {app}"),
    )
    .extra("app_name", app))
}

fn handle_close_app(intent: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    let app = validate_app_name(required(intent, "app_name", "No app name specified")?)?;
    Ok(Plan::new(
        Action::CloseApp {
            app_name: app.to_string(),
        },
        format!("Closed {app}"),
        format!("Failed to close {app}"),
    )
    .extra("app_name", app))
}

fn handle_search(intent: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    let query = required(intent, "query", "No search query specified")?;
    Ok(Plan::new(
        Action::SearchWeb {
            query: query.to_string(),
        },
        format!("Searched for: {query}"),
        "Failed to open search",
    )
    .extra("query", query))
}

fn handle_play_music(intent: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    let song = intent.entity_value("song_name");
    let success = song.map_or_else(
        || "Opening music player".to_string(),
        |s| format!("Opening music player to play {s}"),
    );
    Ok(Plan::new(
        Action::PlayMusic {
            song: song.map(ToString::to_string),
        },
        success,
        "Failed to open music player",
    ))
}

fn handle_set_timer(intent: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    let missing = "Timer duration not specified";
    let duration = required(intent, "duration", missing)?;
    let unit = required(intent, "unit", missing)?;
    let seconds = timer_seconds(duration, unit)?;
    let label = format!("{duration} {unit}");

    let mut plan = Plan::new(
        Action::SetTimer {
            seconds,
            label: label.clone(),
        },
        format!("Timer set for {label}"),
        "Failed to set timer",
    );
    plan.extras.insert("seconds".to_string(), Value::from(seconds));
    Ok(plan)
}

fn handle_get_weather(intent: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    let query = intent
        .entity_value("location")
        .map_or_else(|| "weather".to_string(), |l| format!("weather in {l}"));
    Ok(Plan::new(
        Action::SearchWeb { query },
        "Opening weather search",
        "Failed to get weather",
    ))
}

fn handle_get_time(_: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(
        Action::ReportTime,
        "The time is {time}",
        "Failed to read the clock",
    ))
}

fn handle_volume_up(_: &Intent, settings: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(
        Action::VolumeUp {
            step: settings.volume_step,
        },
        "Volume increased",
        "Failed to increase volume",
    ))
}

fn handle_volume_down(_: &Intent, settings: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(
        Action::VolumeDown {
            step: settings.volume_step,
        },
        "Volume decreased",
        "Failed to decrease volume",
    ))
}

fn handle_shutdown(_: &Intent, settings: &DispatchSettings) -> Result<Plan, String> {
    if !settings.allow_shutdown {
        return Err("Shutdown requires explicit confirmation for safety".to_string());
    }
    Ok(Plan::new(Action::Shutdown, "Shutting down", "Failed to shut down"))
}

fn handle_screenshot(_: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(
        Action::Screenshot,
        "Screenshot saved to {path}",
        "Failed to take screenshot",
    ))
}

fn handle_mute(_: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(Action::Mute, "Audio muted", "Failed to mute audio"))
}

fn handle_unmute(_: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(Action::Unmute, "Audio unmuted", "Failed to unmute audio"))
}

fn handle_lock_screen(_: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(Action::LockScreen, "Screen locked", "Failed to lock screen"))
}

fn handle_next_track(_: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(
        Action::MediaNext,
        "Skipped to next track",
        "Failed to skip track",
    ))
}

fn handle_previous_track(_: &Intent, _: &DispatchSettings) -> Result<Plan, String> {
    Ok(Plan::new(
        Action::MediaPrevious,
        "Went back to previous track",
        "Failed to go back a track",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_placeholders() {
        let mut data = Map::new();
        data.insert("time".to_string(), Value::from("09:41 AM"));
        assert_eq!(render("The time is {time}", &data), "The time is 09:41 AM");
        assert_eq!(render("no placeholders", &data), "no placeholders");
    }

    #[test]
    fn test_every_kind_but_unknown_has_a_handler() {
        let kinds: Vec<_> = HANDLERS.iter().map(|(k, _)| *k).collect();
        for def in crate::intent::definitions() {
            assert!(kinds.contains(&def.kind), "missing handler for {}", def.kind);
        }
        assert!(!kinds.contains(&IntentKind::Unknown));
    }

    #[test]
    fn test_shutdown_refused_by_default() {
        let intent = Intent {
            kind: IntentKind::Shutdown,
            confidence: 0.95,
            raw_text: "shut down".to_string(),
            entities: Vec::new(),
        };
        let refused = handle_shutdown(&intent, &DispatchSettings::default());
        assert!(refused.is_err());

        let allowed = DispatchSettings {
            allow_shutdown: true,
            ..DispatchSettings::default()
        };
        assert!(handle_shutdown(&intent, &allowed).is_ok());
    }
}
