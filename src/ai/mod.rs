use async_trait::async_trait;
use std::time::Duration;

use crate::imaging::GenerationRequest;

pub mod fusion_brain;
pub mod mistral;
pub mod types;
pub mod whisper;
pub use types::*;

/// Chat-completion backend (Mistral, or anything speaking the same API).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send the ordered messages and return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError>;

    /// Provider name for logging/display
    fn name(&self) -> &str;
}

/// Speech-to-text backend.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe a WAV clip. `language` is a BCP-47 tag such as `ru-RU`.
    /// Returns `AiError::NoSpeech` when nothing intelligible was heard.
    async fn transcribe(&self, wav: &[u8], language: &str) -> Result<String, AiError>;

    fn name(&self) -> &str;
}

/// Remote asynchronous image-generation queue.
///
/// The three calls map one-to-one onto the queue's endpoints; sequencing
/// (resolve, submit, poll) lives in [`crate::imaging`].
#[async_trait]
pub trait ImageQueue: Send + Sync {
    /// List the ids of the available generation models, in server order.
    async fn list_models(&self) -> Result<Vec<String>, AiError>;

    /// Enqueue one generation job and return its id.
    async fn submit(&self, model_id: &str, request: &GenerationRequest) -> Result<JobHandle, AiError>;

    /// One status check for a previously submitted job.
    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, AiError>;

    fn name(&self) -> &str;
}

/// Shared `reqwest` client with an explicit timeout on every call.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            log::warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Join a base endpoint and a relative API path, tolerating a missing
/// trailing slash on the endpoint.
pub(crate) fn endpoint_url(endpoint: &str, path: &str) -> String {
    format!(
        "{}/{}",
        endpoint.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Map a non-success HTTP status to a transport-level error.
pub(crate) fn http_error(status: reqwest::StatusCode, body: String) -> AiError {
    match status.as_u16() {
        401 | 403 => AiError::AuthError(body),
        _ => AiError::ConnectionError(format!("HTTP {}: {}", status, body)),
    }
}
