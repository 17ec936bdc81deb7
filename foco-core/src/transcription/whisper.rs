//! Hosted Whisper-compatible transcription over HTTPS multipart upload.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{wav::encode_wav, Transcriber};
use crate::buffering::AudioChunk;
use crate::error::{FocoError, Result};

pub const DEFAULT_TRANSCRIPTION_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_LANGUAGE: &str = "es";

#[derive(Clone)]
pub struct WhisperConfig {
    /// Bearer token. Required.
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    /// ISO-639-1 code of the spoken language.
    pub language: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl WhisperConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_TRANSCRIPTION_ENDPOINT.into(),
            model: DEFAULT_TRANSCRIPTION_MODEL.into(),
            language: DEFAULT_LANGUAGE.into(),
            timeout: Duration::from_secs(20),
        }
    }
}

impl std::fmt::Debug for WhisperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("language", &self.language)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text gateway for OpenAI-style `/audio/transcriptions` endpoints.
#[derive(Debug)]
pub struct WhisperTranscriber {
    client: reqwest::Client,
    config: WhisperConfig,
}

impl WhisperTranscriber {
    /// # Errors
    /// `FocoError::Config` if the API key or endpoint is empty, or the HTTP
    /// client cannot be built.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(FocoError::Config(
                "speech-to-text API key is required".into(),
            ));
        }
        if config.endpoint.trim().is_empty() {
            return Err(FocoError::Config(
                "speech-to-text endpoint is required".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FocoError::Config(format!("STT client build failed: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, chunk: &AudioChunk) -> Result<String> {
        let wav_bytes = encode_wav(chunk)?;
        debug!(
            chunk_id = chunk.id,
            wav_bytes = wav_bytes.len(),
            duration_ms = chunk.duration_ms(),
            "uploading chunk for transcription"
        );

        let file_part = multipart::Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("language", self.config.language.clone())
            .text("response_format", "json")
            .part("file", file_part);

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, body = %body, "transcription request returned non-success status");
            return Err(FocoError::Transcription(format!(
                "service returned {status}: {body}"
            )));
        }

        let payload: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| FocoError::Transcription(format!("unparseable response: {e}")))?;
        let text = payload.text.trim().to_string();
        debug!(chunk_id = chunk.id, transcript = %text, "transcription complete");
        Ok(text)
    }
}
