//! Fixed-interval completion polling.
//!
//! After submission the orchestrator calls [`wait_for_completion`], which
//! polls the backend until the job completes, the backend reports a
//! failure, the attempt budget runs out, or the [`CancellationToken`] is
//! triggered. Transport errors while polling are not retried separately;
//! they use up one attempt like any other incomplete poll.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::executor::{BackendError, RenderBackend};
use crate::job::JobStatus;

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of polls before giving up (10 minutes at 2s).
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 300;

/// Tunable parameters for the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between consecutive polls.
    pub interval: Duration,
    /// Total polls allowed, including the first.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
        }
    }
}

/// Poll `job_id` until it completes.
///
/// Returns the completed status, or [`BackendError::ExecutionFailed`],
/// [`BackendError::Timeout`] or [`BackendError::Cancelled`].
pub async fn wait_for_completion(
    backend: &dyn RenderBackend,
    job_id: &str,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<JobStatus, BackendError> {
    let cancelled = || BackendError::Cancelled {
        job_id: job_id.to_string(),
    };

    for attempt in 1..=config.max_attempts {
        let status = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled()),
            status = backend.poll(job_id) => status,
        };

        if status.completed {
            tracing::info!(
                job_id,
                attempt,
                artifacts = status.artifacts_meta.len(),
                "Job completed",
            );
            return Ok(status);
        }

        if status.is_failed() {
            let reason = status.failure_reason();
            tracing::warn!(job_id, attempt, %reason, "Job failed on backend");
            return Err(BackendError::ExecutionFailed {
                job_id: job_id.to_string(),
                reason,
            });
        }

        match &status.error {
            Some(error) => {
                tracing::warn!(job_id, attempt, %error, "Status poll failed, will poll again");
            }
            None => {
                tracing::debug!(job_id, attempt, status = %status.status_text, "Job not complete");
            }
        }

        if attempt < config.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(config.interval) => {}
            }
        }
    }

    tracing::warn!(job_id, attempts = config.max_attempts, "Job did not complete in time");
    Err(BackendError::Timeout(format!(
        "job {job_id} not complete after {} polls",
        config.max_attempts
    )))
}
