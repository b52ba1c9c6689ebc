//! Job execution against one ComfyUI backend: submit, poll, fetch.
//!
//! [`RenderBackend`] is the seam the request orchestrator depends on;
//! [`ComfyUIExecutor`] is the production implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use easel_core::backend::BackendEndpoint;
use easel_core::template::JobTemplate;
use indexmap::IndexMap;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::job::{parse_history, ArtifactMeta, JobStatus};
use crate::storage::{ArtifactStore, StoredArtifact};

/// Identifies an artifact on the backend. Filenames are only unique
/// within a subfolder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub subfolder: String,
    pub filename: String,
}

impl ArtifactKey {
    pub fn new(subfolder: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            subfolder: subfolder.into(),
            filename: filename.into(),
        }
    }
}

impl From<&ArtifactMeta> for ArtifactKey {
    fn from(meta: &ArtifactMeta) -> Self {
        Self::new(meta.subfolder.clone(), meta.filename.clone())
    }
}

/// Fetch results in backend order. `None` marks an artifact that could not
/// be downloaded or stored.
pub type FetchedArtifacts = IndexMap<ArtifactKey, Option<StoredArtifact>>;

/// Failures that abort a job from the gateway's point of view.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The job could not be queued.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// The backend ran the job and reported an error.
    #[error("Job {job_id} failed: {reason}")]
    ExecutionFailed { job_id: String, reason: String },

    /// The job did not finish within the allowed budget. It may still be
    /// running on the backend.
    #[error("Timed out waiting for job: {0}")]
    Timeout(String),

    /// The gateway is shutting down.
    #[error("Polling for job {job_id} was cancelled")]
    Cancelled { job_id: String },
}

/// Operations the orchestrator needs from a rendering backend.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Queue a bound template, returning the backend job ID.
    async fn submit(&self, template: &JobTemplate) -> Result<String, BackendError>;

    /// Fetch the current status of a job. Transport failures are reported
    /// in the returned status rather than as an error.
    async fn poll(&self, job_id: &str) -> JobStatus;

    /// Download and store each artifact independently.
    async fn fetch(&self, artifacts: &[ArtifactMeta]) -> FetchedArtifacts;
}

/// [`RenderBackend`] backed by a ComfyUI server.
#[derive(Debug, Clone)]
pub struct ComfyUIExecutor {
    endpoint: Arc<BackendEndpoint>,
    api: ComfyUIApi,
    store: ArtifactStore,
}

impl ComfyUIExecutor {
    /// Build an executor for `endpoint` that writes artifacts to `store`.
    pub fn new(
        endpoint: Arc<BackendEndpoint>,
        store: ArtifactStore,
        request_timeout: Duration,
    ) -> Result<Self, ComfyUIApiError> {
        let api = ComfyUIApi::new(endpoint.base_url(), request_timeout)?;
        Ok(Self {
            endpoint,
            api,
            store,
        })
    }

    async fn fetch_one(&self, meta: &ArtifactMeta) -> Option<StoredArtifact> {
        let bytes = match self
            .api
            .view_file(&meta.filename, &meta.kind, &meta.subfolder, &meta.format)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    backend = %self.endpoint.name,
                    subfolder = %meta.subfolder,
                    filename = %meta.filename,
                    error = %e,
                    "Artifact download failed",
                );
                return None;
            }
        };

        match self.store.persist(&meta.subfolder, &meta.filename, &bytes).await {
            Ok(stored) => {
                tracing::debug!(
                    path = %stored.relative_path.display(),
                    size_bytes = stored.size_bytes,
                    "Artifact stored",
                );
                Some(stored)
            }
            Err(e) => {
                tracing::warn!(filename = %meta.filename, error = %e, "Artifact store failed");
                None
            }
        }
    }
}

#[async_trait]
impl RenderBackend for ComfyUIExecutor {
    async fn submit(&self, template: &JobTemplate) -> Result<String, BackendError> {
        let client_id = uuid::Uuid::new_v4().to_string();

        let response = self
            .api
            .submit_workflow(&template.as_value(), &client_id)
            .await
            .map_err(|e| BackendError::Submission(e.to_string()))?;

        if response.prompt_id.is_empty() {
            return Err(BackendError::Submission(
                "Backend returned an empty prompt_id".to_string(),
            ));
        }

        tracing::info!(
            backend = %self.endpoint.name,
            prompt_id = %response.prompt_id,
            queue_position = ?response.number,
            "Workflow submitted to ComfyUI",
        );

        Ok(response.prompt_id)
    }

    async fn poll(&self, job_id: &str) -> JobStatus {
        match self.api.get_history(job_id).await {
            Ok(history) => parse_history(job_id, &history),
            Err(e) => JobStatus::transport_error(job_id, e),
        }
    }

    async fn fetch(&self, artifacts: &[ArtifactMeta]) -> FetchedArtifacts {
        let results =
            futures::future::join_all(artifacts.iter().map(|meta| self.fetch_one(meta))).await;

        artifacts
            .iter()
            .zip(results)
            .map(|(meta, stored)| (ArtifactKey::from(meta), stored))
            .collect()
    }
}
