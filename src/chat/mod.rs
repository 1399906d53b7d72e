//! Conversational model collaborator
//!
//! The pipeline falls back to a [`Chat`] when an utterance is not a
//! recognised command. Failures are split into connection-class errors,
//! which trip the session circuit breaker, and everything else.

mod ollama;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ollama::OllamaChat;

/// Substrings that mark an untyped failure as connection-class
const CONNECTION_MARKERS: &[&str] = &[
    "connection refused",
    "actively refused",
    "failed to establish a new connection",
    "error trying to connect",
    "connecterror",
];

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat failure, classified for the circuit breaker
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// The model endpoint could not be reached at all
    #[error("connection failed: {0}")]
    Connection(String),

    /// Anything else: bad status, timeout, malformed reply
    #[error("{0}")]
    Other(String),
}

impl ChatError {
    /// Classify an untyped failure message by substring
    #[must_use]
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if CONNECTION_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Connection(message)
        } else {
            Self::Other(message)
        }
    }

    /// Whether this failure should trip the circuit breaker
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Conversational model
#[async_trait]
pub trait Chat: Send + Sync {
    /// Send the conversation and return the assistant's reply
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Connection`] when the model is unreachable and
    /// [`ChatError::Other`] for every other failure.
    async fn send(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}
