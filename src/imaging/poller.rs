use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ai::{AiError, ImageQueue, JobHandle, JobStatus};

/// Attempt budget and fixed wait between status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(10),
        }
    }
}

/// Waits for a queued job by checking its status at a fixed interval.
pub struct JobPoller {
    queue: Arc<dyn ImageQueue>,
}

impl JobPoller {
    pub fn new(queue: Arc<dyn ImageQueue>) -> Self {
        Self { queue }
    }

    /// Check `handle` until it is done or `policy.max_attempts` checks have
    /// been spent.
    ///
    /// * `Done` returns the (still base64-encoded) artifacts at once.
    /// * `Failed` ends the loop with [`AiError::Poll`].
    /// * `Pending` and transport errors each consume one attempt; any other
    ///   error from the status call ends the loop unchanged. Between
    ///   attempts the task sleeps exactly `policy.interval`; the last attempt
    ///   does not sleep.
    ///
    /// On exhaustion the result is [`AiError::PollTimeout`], or
    /// [`AiError::Poll`] if the final check failed at the transport level.
    /// The cancellation token is honored before every check and during
    /// every wait.
    pub async fn poll(
        &self,
        handle: &JobHandle,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, AiError> {
        if policy.max_attempts == 0 {
            return Err(AiError::Poll("at least one status check is required".into()));
        }

        let mut remaining = policy.max_attempts;
        let mut last_error: Option<AiError>;

        loop {
            if cancel.is_cancelled() {
                return Err(AiError::Cancelled);
            }
            let attempt = policy.max_attempts - remaining + 1;

            let checked = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AiError::Cancelled),
                status = self.queue.status(handle) => status,
            };

            match checked {
                Ok(JobStatus::Done(artifacts)) => {
                    log::info!(
                        "JobPoller: job {} done after {} check(s), {} artifact(s)",
                        handle,
                        attempt,
                        artifacts.len()
                    );
                    return Ok(artifacts);
                }
                Ok(JobStatus::Failed(reason)) => {
                    log::warn!("JobPoller: job {} failed remotely: {}", handle, reason);
                    return Err(AiError::Poll(reason));
                }
                Ok(JobStatus::Pending) => {
                    log::debug!("JobPoller: job {} pending (attempt {})", handle, attempt);
                    last_error = None;
                }
                Err(e) if !e.is_transport() => {
                    log::warn!("JobPoller: status check for job {} aborted: {}", handle, e);
                    return Err(e);
                }
                Err(e) => {
                    log::warn!(
                        "JobPoller: status check {} for job {} failed: {}",
                        attempt,
                        handle,
                        e
                    );
                    last_error = Some(e);
                }
            }

            remaining -= 1;
            if remaining == 0 {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(AiError::Cancelled),
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }

        match last_error {
            Some(e) => Err(AiError::Poll(e.to_string())),
            None => Err(AiError::PollTimeout {
                attempts: policy.max_attempts,
            }),
        }
    }
}
