//! Per-request execution: validate, bind, submit, poll, fetch.
//!
//! Validation and binding are pure and run before anything touches the
//! network, so a bad request never reaches the backend. Submission and
//! polling share one deadline (`EXECUTION_TIMEOUT_SECS`); when it
//! expires the in-flight backend calls are dropped and nothing is fetched.
//! The job itself keeps running on the backend.

use std::time::Duration;

use easel_comfyui::executor::{BackendError, RenderBackend};
use easel_comfyui::job::JobStatus;
use easel_comfyui::poll::{wait_for_completion, PollConfig};
use easel_comfyui::storage::StoredArtifact;
use easel_core::binder::bind;
use easel_core::error::PipelineError;
use easel_core::template::JobTemplate;
use easel_core::types::ValueSet;
use easel_core::validation::{validate, ValidationContext};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::engine::services::RegisteredService;

/// Why a request did not produce a completed job.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result of a completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub prompt_id: String,
    /// Filenames of artifacts that were fetched, in backend order.
    pub images: Vec<String>,
    pub artifacts: Vec<StoredArtifact>,
    /// Artifacts the backend reported but that could not be fetched.
    pub missing: Vec<String>,
}

/// Drives requests through the pipeline. Shared by all services.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    poll: PollConfig,
    execution_timeout: Duration,
    validation: ValidationContext,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        poll: PollConfig,
        execution_timeout: Duration,
        validation: ValidationContext,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            poll,
            execution_timeout,
            validation,
            cancel,
        }
    }

    /// Build from server configuration. `cancel` is triggered at shutdown.
    pub fn from_config(config: &ServerConfig, cancel: CancellationToken) -> Self {
        Self::new(
            config.poll_config(),
            config.execution_timeout(),
            ValidationContext::with_input_dir(&config.input_dir),
            cancel,
        )
    }

    /// Run one request against `service`.
    pub async fn execute(
        &self,
        service: &RegisteredService,
        inputs: &[ValueSet],
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let definition = &service.definition;

        let validated = validate(inputs, &definition.mappings, &self.validation)?;
        let bound = bind(&definition.template, &definition.mappings, &validated)?;
        tracing::debug!(
            service = %definition.name,
            values = validated.len(),
            "Template bound",
        );

        let backend = service.backend.as_ref();
        let (prompt_id, status) =
            match tokio::time::timeout(self.execution_timeout, self.run_job(backend, &bound)).await
            {
                Ok(result) => result?,
                Err(_) => {
                    tracing::warn!(
                        service = %definition.name,
                        timeout_secs = self.execution_timeout.as_secs(),
                        "Execution deadline exceeded",
                    );
                    return Err(BackendError::Timeout(format!(
                        "execution exceeded {}s",
                        self.execution_timeout.as_secs()
                    ))
                    .into());
                }
            };

        let fetched = backend.fetch(&status.artifacts_meta).await;

        let mut outcome = ExecutionOutcome {
            prompt_id,
            images: Vec::with_capacity(fetched.len()),
            artifacts: Vec::with_capacity(fetched.len()),
            missing: Vec::new(),
        };
        for (key, stored) in fetched {
            match stored {
                Some(stored) => {
                    outcome.images.push(key.filename);
                    outcome.artifacts.push(stored);
                }
                None => outcome.missing.push(key.filename),
            }
        }

        tracing::info!(
            service = %definition.name,
            prompt_id = %outcome.prompt_id,
            fetched = outcome.images.len(),
            missing = outcome.missing.len(),
            "Execution completed",
        );

        Ok(outcome)
    }

    async fn run_job(
        &self,
        backend: &dyn RenderBackend,
        template: &JobTemplate,
    ) -> Result<(String, JobStatus), BackendError> {
        let prompt_id = backend.submit(template).await?;
        let status = wait_for_completion(backend, &prompt_id, &self.poll, &self.cancel).await?;
        Ok((prompt_id, status))
    }
}
