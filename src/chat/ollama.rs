//! Ollama chat client

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Chat, ChatError, ChatMessage};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

/// [`Chat`] backed by a local Ollama server (`POST {base}/api/chat`)
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaChat {
    /// Create a client for `base_url` using `model`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[async_trait]
impl Chat for OllamaChat {
    async fn send(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        tracing::debug!(model = %self.model, turns = messages.len(), "sending chat request");

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "chat request failed");
                if e.is_connect() {
                    ChatError::Connection(e.to_string())
                } else if e.is_timeout() {
                    ChatError::Other("chat request timed out".to_string())
                } else {
                    ChatError::classify(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat API error");
            return Err(ChatError::Other(format!("chat API error {status}: {body}")));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Other(format!("invalid chat response: {e}")))?;

        Ok(reply.message.content.trim().to_string())
    }
}
