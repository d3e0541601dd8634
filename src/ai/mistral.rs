use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{endpoint_url, http_client, http_error, AiError, ChatMessage, ChatProvider};

/// Mistral chat-completions client (`POST /v1/chat/completions`).
pub struct MistralChatClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl MistralChatClient {
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

    fn build_request_body(&self, messages: &[ChatMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
        })
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn parse_completion(body: &Value) -> Result<String, AiError> {
    body.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| AiError::Completion("response has no message content".into()))
}

#[async_trait]
impl ChatProvider for MistralChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AiError> {
        let url = endpoint_url(&self.endpoint, "v1/chat/completions");
        log::info!(
            "Mistral: requesting completion ({} messages, model={})",
            messages.len(),
            self.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request_body(messages))
            .send()
            .await
            .map_err(|e| AiError::Completion(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".into());
            log::warn!("Mistral: HTTP {}", status);
            return Err(AiError::Completion(http_error(status, error_body).to_string()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AiError::Completion(format!("invalid JSON: {}", e)))?;
        parse_completion(&body)
    }

    fn name(&self) -> &str {
        "mistral-chat"
    }
}
