//! TOML configuration file loading
//!
//! Supports `~/.config/spark/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::intent::IntentKind;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SparkConfigFile {
    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Local LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Action execution configuration
    #[serde(default)]
    pub actions: ActionsFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// Trigger phrases (e.g. `["hey assistant", "computer"]`)
    pub wake_words: Option<Vec<String>>,

    /// Start wake word monitoring with the pipeline
    pub wake_word_enabled: Option<bool>,

    /// Audio captured per wake word check
    pub chunk_seconds: Option<f64>,

    /// Pause after a detection
    pub cooldown_seconds: Option<f64>,

    /// Pause after a failed wake word check
    pub error_backoff_seconds: Option<f64>,

    /// Minimum activation confidence
    pub wake_confidence_threshold: Option<f32>,

    /// Audio captured per voice command
    pub command_seconds: Option<f64>,

    /// Extra transcription attempts per voice command
    pub retry_count: Option<u32>,

    /// Ambient noise calibration time
    pub ambient_seconds: Option<f64>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// STT endpoint URL
    pub stt_url: Option<String>,

    /// Speak results aloud
    pub tts_enabled: Option<bool>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Enable chat fallback
    pub enabled: Option<bool>,

    /// Ollama base URL
    pub base_url: Option<String>,

    /// Model identifier (e.g. "llama3.2")
    pub model: Option<String>,

    /// Request timeout
    pub timeout_seconds: Option<u64>,

    /// Conversation turns sent with each request
    pub history_window: Option<usize>,

    /// System prompt prepended to every request
    pub system_prompt: Option<String>,
}

/// Action execution configuration
#[derive(Debug, Default, Deserialize)]
pub struct ActionsFileConfig {
    /// Let the shutdown intent reach the OS
    pub allow_shutdown: Option<bool>,

    /// Volume change per request, in percent
    pub volume_step: Option<u8>,

    /// Intent kinds to leave without a handler
    pub disabled: Option<Vec<IntentKind>>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SparkConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SparkConfigFile {
    config_file_path().map_or_else(SparkConfigFile::default, |path| load_config_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_from(path: &Path) -> SparkConfigFile {
    if !path.exists() {
        return SparkConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                SparkConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SparkConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/spark/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("spark").join("config.toml"))
}
