// whisper.rs — Speech-to-text over an OpenAI-compatible
// `/v1/audio/transcriptions` endpoint. The clip is uploaded as a WAV file in
// a multipart form; the reply is `{ "text": "..." }`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::{endpoint_url, http_client, http_error, AiError, SpeechRecognizer};

pub struct WhisperClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl WhisperClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: http_client(timeout),
        }
    }
}

/// The transcription API takes ISO-639-1 codes, so `ru-RU` becomes `ru`.
pub fn primary_language(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or(tag)
        .trim()
        .to_ascii_lowercase()
}

/// Extract the recognized text; blank text means no speech was detected.
fn parse_transcript(body: &Value) -> Result<String, AiError> {
    let text = body
        .get("text")
        .and_then(|t| t.as_str())
        .ok_or_else(|| AiError::Transcription("response has no text field".into()))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(AiError::NoSpeech);
    }
    Ok(text.to_string())
}

#[async_trait]
impl SpeechRecognizer for WhisperClient {
    async fn transcribe(&self, wav: &[u8], language: &str) -> Result<String, AiError> {
        if wav.is_empty() {
            return Err(AiError::NoSpeech);
        }
        let url = endpoint_url(&self.endpoint, "v1/audio/transcriptions");
        log::info!("Whisper: transcribing {} bytes ({})", wav.len(), language);

        let file = Part::bytes(wav.to_vec())
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| AiError::Transcription(e.to_string()))?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("language", primary_language(language))
            .text("response_format", "json");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AiError::Transcription(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            log::warn!("Whisper: HTTP {}", status);
            return Err(AiError::Transcription(
                http_error(status, error_body).to_string(),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AiError::Transcription(format!("invalid JSON: {}", e)))?;
        parse_transcript(&body)
    }

    fn name(&self) -> &str {
        "whisper"
    }
}
