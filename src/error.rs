//! Error types for the Spark assistant

use thiserror::Error;

/// Result type alias for Spark operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or driving the assistant
///
/// Component boundaries inside the command pipeline convert these into
/// structured failure values; they only surface from constructors,
/// configuration loading and the concrete audio/network adapters.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
