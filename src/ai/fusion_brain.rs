use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;

use super::{endpoint_url, http_client, http_error, AiError, ImageQueue, JobHandle, JobStatus};
use crate::imaging::GenerationRequest;

const MODELS_PATH: &str = "key/api/v1/models";
const RUN_PATH: &str = "key/api/v1/text2image/run";
const STATUS_PATH: &str = "key/api/v1/text2image/status/";

/// Client for a Fusion-Brain style text-to-image queue.
///
/// Every call carries the two static credentials as `X-Key` / `X-Secret`
/// headers.
pub struct FusionBrainClient {
    endpoint: String,
    api_key: String,
    secret_key: String,
    client: Client,
}

impl FusionBrainClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            client: http_client(timeout),
        }
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("X-Key", format!("Key {}", self.api_key))
            .header("X-Secret", format!("Secret {}", self.secret_key))
    }

    async fn send_json(&self, req: RequestBuilder) -> Result<Value, AiError> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| AiError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".into());
            return Err(http_error(status, error_body));
        }

        response
            .json()
            .await
            .map_err(|e| AiError::InvalidResponse(format!("bad JSON: {e}")))
    }
}

/// Build the `params` JSON part of a run request.
fn build_run_params(request: &GenerationRequest) -> Value {
    json!({
        "type": "GENERATE",
        "numImages": 1,
        "width": request.width(),
        "height": request.height(),
        "generateParams": {
            "query": request.prompt(),
        }
    })
}

/// Model ids come back as numbers or strings depending on the deployment.
fn parse_model_ids(body: &Value) -> Result<Vec<String>, AiError> {
    let models = body
        .as_array()
        .ok_or_else(|| AiError::InvalidResponse("model listing is not an array".into()))?;
    Ok(models
        .iter()
        .filter_map(|m| match m.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

fn parse_job_id(body: &Value) -> Result<JobHandle, AiError> {
    body.get("uuid")
        .and_then(|u| u.as_str())
        .filter(|u| !u.is_empty())
        .map(JobHandle::new)
        .ok_or_else(|| AiError::InvalidResponse("run response has no uuid".into()))
}

fn parse_status(body: &Value) -> Result<JobStatus, AiError> {
    let status = body
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| AiError::InvalidResponse("status response has no status".into()))?;
    let images = body.get("images").and_then(|i| i.as_array()).map(|arr| {
        arr.iter()
            .filter_map(|img| img.as_str().map(str::to_string))
            .collect::<Vec<_>>()
    });
    let detail = body
        .get("errorDescription")
        .and_then(|d| d.as_str())
        .map(str::to_string);
    Ok(JobStatus::from_wire(status, images, detail))
}

#[async_trait]
impl ImageQueue for FusionBrainClient {
    async fn list_models(&self) -> Result<Vec<String>, AiError> {
        let url = endpoint_url(&self.endpoint, MODELS_PATH);
        log::info!("FusionBrain: listing models");
        let body = self.send_json(self.client.get(&url)).await?;
        parse_model_ids(&body)
    }

    async fn submit(&self, model_id: &str, request: &GenerationRequest) -> Result<JobHandle, AiError> {
        let url = endpoint_url(&self.endpoint, RUN_PATH);
        let params = serde_json::to_vec(&build_run_params(request))
            .map_err(|e| AiError::Submission(e.to_string()))?;
        let params_part = Part::bytes(params)
            .mime_str("application/json")
            .map_err(|e| AiError::Submission(e.to_string()))?;
        let form = Form::new()
            .text("model_id", model_id.to_string())
            .part("params", params_part);

        log::info!(
            "FusionBrain: submitting {}x{} job on model {}",
            request.width(),
            request.height(),
            model_id
        );
        let body = self.send_json(self.client.post(&url).multipart(form)).await?;
        parse_job_id(&body)
    }

    async fn status(&self, handle: &JobHandle) -> Result<JobStatus, AiError> {
        let url = endpoint_url(&self.endpoint, &format!("{STATUS_PATH}{handle}"));
        let body = self.send_json(self.client.get(&url)).await?;
        parse_status(&body)
    }

    fn name(&self) -> &str {
        "fusion-brain"
    }
}
