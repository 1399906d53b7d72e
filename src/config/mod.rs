//! Configuration management for the Spark assistant
//!
//! Values are resolved as env > toml > default. The pipeline itself never
//! reads configuration; it receives the plain settings built here.

pub mod file;

use std::time::Duration;

use crate::actions::DispatchSettings;
use crate::intent::IntentKind;
use crate::pipeline::{PipelineSettings, SessionSettings};
use crate::voice::{WHISPER_URL, WakeWordSettings};
use crate::{Error, Result};

use self::file::SparkConfigFile;

/// Prompt prepended to every chat request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a personal AI assistant running entirely on the \
user's local machine. Be concise, friendly, and helpful. When the user asks for things like opening \
apps, changing volume, or system actions, respond naturally but do not describe internal code. If \
something is better done by the existing command system, simply answer as if it already happened.";

/// Maximum number of trigger phrases
const MAX_WAKE_WORDS: usize = 10;

/// Accepted trigger phrase length, in characters
const WAKE_WORD_LEN: std::ops::RangeInclusive<usize> = 2..=50;

/// Upper bound for any duration setting, in seconds
const MAX_DURATION_SECONDS: f64 = 86_400.0;

/// Spark assistant configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Voice configuration
    pub voice: VoiceConfig,

    /// Local LLM configuration
    pub llm: LlmConfig,

    /// Action execution configuration
    pub actions: ActionsConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input
    pub enabled: bool,

    /// Trigger phrases for wake word monitoring
    pub wake_words: Vec<String>,

    /// Start wake word monitoring with the pipeline
    pub wake_word_enabled: bool,

    /// Audio captured per wake word check, in seconds
    pub chunk_seconds: f64,

    /// Pause after a detection, in seconds
    pub cooldown_seconds: f64,

    /// Pause after a failed wake word check, in seconds
    pub error_backoff_seconds: f64,

    /// Minimum activation confidence (0.0 to 1.0)
    pub wake_confidence_threshold: f32,

    /// Audio captured per voice command, in seconds
    pub command_seconds: f64,

    /// Extra transcription attempts per voice command
    pub retry_count: u32,

    /// Ambient noise calibration time, in seconds
    pub ambient_seconds: f64,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// STT endpoint URL
    pub stt_url: String,

    /// Speak results aloud
    pub tts_enabled: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wake_words: vec!["hey assistant".to_string(), "computer".to_string()],
            wake_word_enabled: false,
            chunk_seconds: 2.0,
            cooldown_seconds: 1.0,
            error_backoff_seconds: 0.5,
            wake_confidence_threshold: 0.6,
            command_seconds: 5.0,
            retry_count: 1,
            ambient_seconds: 1.0,
            stt_model: "whisper-1".to_string(),
            stt_url: WHISPER_URL.to_string(),
            tts_enabled: true,
        }
    }
}

/// Local LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Enable chat fallback
    pub enabled: bool,

    /// Ollama base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Request timeout, in seconds
    pub timeout_seconds: u64,

    /// Conversation turns kept and sent with each request
    pub history_window: usize,

    /// System prompt prepended to every request
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_seconds: 20,
            history_window: 8,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Action execution configuration
#[derive(Debug, Clone)]
pub struct ActionsConfig {
    /// Let the shutdown intent reach the OS
    pub allow_shutdown: bool,

    /// Volume change per request, in percent
    pub volume_step: u8,

    /// Intent kinds left without a handler
    pub disabled: Vec<IntentKind>,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            allow_shutdown: false,
            volume_step: 10,
            disabled: Vec::new(),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (for Whisper)
    pub openai: Option<String>,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if the resolved values fail validation
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if the resolved values fail validation
    pub fn from_sources(fc: SparkConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let flag = |key: &str| env(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        let defaults = Self::default();

        // Voice config (env > toml > default)
        let voice = VoiceConfig {
            enabled: flag("SPARK_VOICE_ENABLED")
                .or(fc.voice.enabled)
                .unwrap_or(defaults.voice.enabled),
            wake_words: env("SPARK_WAKE_WORDS")
                .map(|v| v.split(',').map(|w| w.trim().to_string()).collect())
                .or(fc.voice.wake_words)
                .unwrap_or(defaults.voice.wake_words),
            wake_word_enabled: flag("SPARK_WAKE_WORD_ENABLED")
                .or(fc.voice.wake_word_enabled)
                .unwrap_or(defaults.voice.wake_word_enabled),
            chunk_seconds: fc.voice.chunk_seconds.unwrap_or(defaults.voice.chunk_seconds),
            cooldown_seconds: fc
                .voice
                .cooldown_seconds
                .unwrap_or(defaults.voice.cooldown_seconds),
            error_backoff_seconds: fc
                .voice
                .error_backoff_seconds
                .unwrap_or(defaults.voice.error_backoff_seconds),
            wake_confidence_threshold: fc
                .voice
                .wake_confidence_threshold
                .unwrap_or(defaults.voice.wake_confidence_threshold),
            command_seconds: fc
                .voice
                .command_seconds
                .unwrap_or(defaults.voice.command_seconds),
            retry_count: env("SPARK_RETRY_COUNT")
                .and_then(|s| s.parse().ok())
                .or(fc.voice.retry_count)
                .unwrap_or(defaults.voice.retry_count),
            ambient_seconds: fc
                .voice
                .ambient_seconds
                .unwrap_or(defaults.voice.ambient_seconds),
            stt_model: env("SPARK_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.voice.stt_model),
            stt_url: env("SPARK_STT_URL")
                .or(fc.voice.stt_url)
                .unwrap_or(defaults.voice.stt_url),
            tts_enabled: flag("SPARK_TTS_ENABLED")
                .or(fc.voice.tts_enabled)
                .unwrap_or(defaults.voice.tts_enabled),
        };

        // LLM config (env > toml > default)
        let llm = LlmConfig {
            enabled: flag("SPARK_LLM_ENABLED")
                .or(fc.llm.enabled)
                .unwrap_or(defaults.llm.enabled),
            base_url: env("LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or(defaults.llm.base_url),
            model: env("LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(defaults.llm.model),
            timeout_seconds: fc
                .llm
                .timeout_seconds
                .unwrap_or(defaults.llm.timeout_seconds),
            history_window: fc
                .llm
                .history_window
                .unwrap_or(defaults.llm.history_window),
            system_prompt: fc
                .llm
                .system_prompt
                .unwrap_or(defaults.llm.system_prompt),
        };

        let actions = ActionsConfig {
            allow_shutdown: flag("SPARK_ALLOW_SHUTDOWN")
                .or(fc.actions.allow_shutdown)
                .unwrap_or(defaults.actions.allow_shutdown),
            volume_step: fc
                .actions
                .volume_step
                .unwrap_or(defaults.actions.volume_step),
            disabled: fc.actions.disabled.unwrap_or_default(),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|k| !k.is_empty()),
        };

        let config = Self {
            voice,
            llm,
            actions,
            api_keys,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        validate_wake_words(&self.voice.wake_words)?;

        for (name, value) in [
            ("voice.chunk_seconds", self.voice.chunk_seconds),
            ("voice.command_seconds", self.voice.command_seconds),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{name} must be positive")));
            }
            if value > MAX_DURATION_SECONDS {
                return Err(Error::Config(format!(
                    "{name} must be at most {MAX_DURATION_SECONDS} seconds"
                )));
            }
        }

        for (name, value) in [
            ("voice.cooldown_seconds", self.voice.cooldown_seconds),
            ("voice.error_backoff_seconds", self.voice.error_backoff_seconds),
            ("voice.ambient_seconds", self.voice.ambient_seconds),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!("{name} must not be negative")));
            }
            if value > MAX_DURATION_SECONDS {
                return Err(Error::Config(format!(
                    "{name} must be at most {MAX_DURATION_SECONDS} seconds"
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.voice.wake_confidence_threshold) {
            return Err(Error::Config(
                "voice.wake_confidence_threshold must be between 0 and 1".to_string(),
            ));
        }

        if self.llm.history_window == 0 {
            return Err(Error::Config("llm.history_window must be at least 1".to_string()));
        }

        if self.llm.timeout_seconds == 0 {
            return Err(Error::Config("llm.timeout_seconds must be positive".to_string()));
        }

        if !(1..=100).contains(&self.actions.volume_step) {
            return Err(Error::Config(
                "actions.volume_step must be between 1 and 100".to_string(),
            ));
        }

        Ok(())
    }

    /// Wake word monitor settings
    #[must_use]
    pub fn wake_word_settings(&self) -> WakeWordSettings {
        WakeWordSettings {
            trigger_phrases: self.voice.wake_words.clone(),
            chunk: Duration::from_secs_f64(self.voice.chunk_seconds),
            cooldown: Duration::from_secs_f64(self.voice.cooldown_seconds),
            error_backoff: Duration::from_secs_f64(self.voice.error_backoff_seconds),
            confidence_threshold: self.voice.wake_confidence_threshold,
            ..WakeWordSettings::default()
        }
    }

    /// Dispatcher policy
    #[must_use]
    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            allow_shutdown: self.actions.allow_shutdown,
            volume_step: self.actions.volume_step,
            disabled: self.actions.disabled.clone(),
        }
    }

    /// Pipeline settings
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            session: SessionSettings {
                command_duration: Duration::from_secs_f64(self.voice.command_seconds),
                retry_count: self.voice.retry_count,
                history_window: self.llm.history_window,
                system_prompt: self.llm.system_prompt.clone(),
                speak_results: self.voice.tts_enabled,
                ..SessionSettings::default()
            },
            wake_word: self.wake_word_settings(),
            wake_word_enabled: self.voice.wake_word_enabled,
            ambient_duration: Duration::from_secs_f64(self.voice.ambient_seconds),
        }
    }

    /// Chat request timeout
    #[must_use]
    pub const fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_seconds)
    }
}

/// Validate trigger phrases
///
/// # Errors
///
/// Returns [`Error::Config`] if the list is empty or too long, or a phrase
/// has the wrong length or characters other than letters, spaces and hyphens
pub fn validate_wake_words(wake_words: &[String]) -> Result<()> {
    if wake_words.is_empty() {
        return Err(Error::Config("at least one wake word is required".to_string()));
    }

    if wake_words.len() > MAX_WAKE_WORDS {
        return Err(Error::Config(format!(
            "too many wake words (max {MAX_WAKE_WORDS})"
        )));
    }

    for word in wake_words {
        let trimmed = word.trim();
        if !WAKE_WORD_LEN.contains(&trimmed.chars().count()) {
            return Err(Error::Config(format!(
                "wake word '{trimmed}' must be {} to {} characters",
                WAKE_WORD_LEN.start(),
                WAKE_WORD_LEN.end()
            )));
        }

        if !trimmed
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '-')
        {
            return Err(Error::Config(format!(
                "wake word '{trimmed}' may only contain letters, spaces and hyphens"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(SparkConfigFile::default(), env_of(&[])).unwrap();
        assert_eq!(config.voice.wake_words, vec!["hey assistant", "computer"]);
        assert_eq!(config.voice.retry_count, 1);
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.history_window, 8);
        assert!(!config.actions.allow_shutdown);
        assert!(config.api_keys.openai.is_none());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut fc = SparkConfigFile::default();
        fc.llm.model = Some("mistral".to_string());
        fc.voice.wake_words = Some(vec!["jarvis".to_string()]);

        let env = env_of(&[("LLM_MODEL", "phi3"), ("SPARK_WAKE_WORDS", "hey spark, computer")]);
        let config = Config::from_sources(fc, env).unwrap();

        assert_eq!(config.llm.model, "phi3");
        assert_eq!(config.voice.wake_words, vec!["hey spark", "computer"]);
    }

    #[test]
    fn test_file_overrides_default() {
        let mut fc = SparkConfigFile::default();
        fc.voice.retry_count = Some(3);
        fc.actions.allow_shutdown = Some(true);

        let config = Config::from_sources(fc, env_of(&[])).unwrap();
        assert_eq!(config.voice.retry_count, 3);
        assert!(config.actions.allow_shutdown);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut fc = SparkConfigFile::default();
        fc.voice.chunk_seconds = Some(0.0);
        assert!(matches!(
            Config::from_sources(fc, env_of(&[])),
            Err(Error::Config(_))
        ));

        let mut fc = SparkConfigFile::default();
        fc.actions.volume_step = Some(0);
        assert!(Config::from_sources(fc, env_of(&[])).is_err());
    }

    #[test]
    fn test_oversized_durations_rejected() {
        let mut fc = SparkConfigFile::default();
        fc.voice.chunk_seconds = Some(1e300);
        assert!(matches!(
            Config::from_sources(fc, env_of(&[])),
            Err(Error::Config(_))
        ));

        let mut fc = SparkConfigFile::default();
        fc.voice.cooldown_seconds = Some(1e300);
        assert!(Config::from_sources(fc, env_of(&[])).is_err());

        let mut fc = SparkConfigFile::default();
        fc.voice.command_seconds = Some(86_400.0);
        let config = Config::from_sources(fc, env_of(&[])).unwrap();
        assert_eq!(
            config.pipeline_settings().session.command_duration,
            Duration::from_secs(86_400)
        );
    }

    #[test]
    fn test_wake_word_validation() {
        assert!(validate_wake_words(&["hey assistant".to_string()]).is_ok());
        assert!(validate_wake_words(&["wake-up".to_string()]).is_ok());
        assert!(validate_wake_words(&[]).is_err());
        assert!(validate_wake_words(&["x".to_string()]).is_err());
        assert!(validate_wake_words(&["hey 2000".to_string()]).is_err());
        assert!(validate_wake_words(&vec!["computer".to_string(); 11]).is_err());
    }

    #[test]
    fn test_pipeline_settings_conversion() {
        let config = Config::default();
        let settings = config.pipeline_settings();
        assert_eq!(settings.session.command_duration, Duration::from_secs(5));
        assert_eq!(settings.session.retry_count, 1);
        assert_eq!(settings.wake_word.chunk, Duration::from_secs(2));
        assert_eq!(settings.wake_word.error_backoff, Duration::from_millis(500));
        assert!(!settings.wake_word_enabled);
    }
}
