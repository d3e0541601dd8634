//! Text-to-image generation: build a request, submit it to the remote
//! queue, poll the job until it completes, and decode the result.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::ai::{AiError, ImageQueue};

pub mod artifact;
pub mod poller;
pub mod request;
pub mod submitter;

pub use artifact::{decode_artifact, GeneratedImage};
pub use poller::{JobPoller, PollPolicy};
pub use request::{
    is_allowed_resolution, parse_dimensions, GenerationRequest, ALLOWED_RESOLUTIONS,
    DEFAULT_RESOLUTION,
};
pub use submitter::JobSubmitter;

/// Submit `request`, wait for the job and decode its first artifact.
///
/// This is the unit of work the shell runs off the UI context. Steps run
/// strictly in order; any failure ends the sequence.
pub async fn generate_image(
    queue: Arc<dyn ImageQueue>,
    request: GenerationRequest,
    policy: PollPolicy,
    cancel: CancellationToken,
) -> Result<GeneratedImage, AiError> {
    let handle = JobSubmitter::new(Arc::clone(&queue))
        .submit(&request, &cancel)
        .await?;
    let artifacts = JobPoller::new(queue).poll(&handle, &policy, &cancel).await?;
    let first = artifacts
        .first()
        .ok_or_else(|| AiError::Poll(format!("job {handle} finished without images")))?;
    decode_artifact(first)
}
