use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::GenerationRequest;
use crate::ai::{AiError, ImageQueue, JobHandle};

/// Resolves the generation model and enqueues one job.
///
/// The model list is queried on every submission; nothing is cached, so a
/// list that changes between calls is picked up immediately.
pub struct JobSubmitter {
    queue: Arc<dyn ImageQueue>,
}

impl JobSubmitter {
    pub fn new(queue: Arc<dyn ImageQueue>) -> Self {
        Self { queue }
    }

    /// Pick the first model the queue advertises.
    pub async fn resolve_model(&self, cancel: &CancellationToken) -> Result<String, AiError> {
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }
        let models = self.queue.list_models().await.map_err(|e| match e {
            AiError::Cancelled => AiError::Cancelled,
            other => AiError::ModelResolution(other.to_string()),
        })?;
        models
            .into_iter()
            .next()
            .ok_or_else(|| AiError::ModelResolution("model list is empty".into()))
    }

    /// Submit `request` and return the job handle. A failure here is
    /// terminal for the request; there is no retry.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<JobHandle, AiError> {
        let model_id = self.resolve_model(cancel).await?;
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }
        let handle = self
            .queue
            .submit(&model_id, request)
            .await
            .map_err(|e| match e {
                AiError::Cancelled => AiError::Cancelled,
                AiError::Submission(msg) => AiError::Submission(msg),
                other => AiError::Submission(other.to_string()),
            })?;
        log::info!("JobSubmitter: job {} accepted by {}", handle, self.queue.name());
        Ok(handle)
    }
}
