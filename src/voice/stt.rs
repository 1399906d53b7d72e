//! Speech-to-text (STT) via the `OpenAI` Whisper API

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::capture::{AudioCapture, SAMPLE_RATE, calculate_energy, samples_to_wav};
use super::{RecognitionResult, Transcriber};
use crate::{Error, Result};

/// Default Whisper transcription endpoint
pub const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Energy floor below which a chunk is treated as silence
const MIN_ENERGY_THRESHOLD: f32 = 0.01;

/// Threshold multiplier applied to measured ambient energy
const AMBIENT_MULTIPLIER: f32 = 1.5;

/// Whisper does not report a confidence; successful results carry this
const WHISPER_CONFIDENCE: f32 = 0.9;

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// [`Transcriber`] that records from the microphone and posts WAV audio to
/// Whisper
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    /// Speech energy gate, stored as `f32` bits
    energy_threshold: AtomicU32,
}

impl WhisperTranscriber {
    /// Create a Whisper transcriber
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be
    /// built
    pub fn new(api_key: String, model: String, url: String, timeout: Duration) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            model,
            url,
            energy_threshold: AtomicU32::new(MIN_ENERGY_THRESHOLD.to_bits()),
        })
    }

    /// Current speech energy gate
    #[must_use]
    pub fn energy_threshold(&self) -> f32 {
        f32::from_bits(self.energy_threshold.load(Ordering::Relaxed))
    }

    /// Transcribe WAV audio
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Whisper rejects the audio
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

/// Record `duration` of audio on a blocking thread
async fn record(duration: Duration) -> Result<Vec<f32>> {
    tokio::task::spawn_blocking(move || AudioCapture::new()?.record(duration))
        .await
        .map_err(|e| Error::Audio(format!("capture task failed: {e}")))?
}

/// Describe an error so that callers can classify it by substring
fn describe(err: &Error) -> String {
    match err {
        Error::Audio(msg) => format!("microphone error: {msg}"),
        Error::Http(e) if e.is_timeout() => format!("request timeout: {e}"),
        Error::Http(e) if e.is_connect() => format!("network connection error: {e}"),
        other => other.to_string(),
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn adjust_for_ambient_noise(&self, duration: Duration) -> bool {
        match record(duration).await {
            Ok(samples) => {
                let ambient = calculate_energy(&samples);
                let threshold = (ambient * AMBIENT_MULTIPLIER).max(MIN_ENERGY_THRESHOLD);
                self.energy_threshold.store(threshold.to_bits(), Ordering::Relaxed);
                tracing::info!(ambient, threshold, "calibrated for ambient noise");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "ambient noise calibration failed");
                false
            }
        }
    }

    async fn listen(&self, duration: Duration) -> RecognitionResult {
        let samples = match record(duration).await {
            Ok(samples) => samples,
            Err(e) => return RecognitionResult::failed(describe(&e), duration),
        };

        let energy = calculate_energy(&samples);
        if energy < self.energy_threshold() {
            tracing::trace!(energy, "chunk below speech threshold");
            return RecognitionResult::silence(duration);
        }

        let transcript = match samples_to_wav(&samples, SAMPLE_RATE) {
            Ok(wav) => self.transcribe(&wav).await,
            Err(e) => Err(e),
        };

        match transcript {
            Ok(text) if text.trim().is_empty() => RecognitionResult::silence(duration),
            Ok(text) => RecognitionResult::heard(text.trim(), WHISPER_CONFIDENCE, duration),
            Err(e) => RecognitionResult::failed(describe(&e), duration),
        }
    }
}
