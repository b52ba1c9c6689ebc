//! Handlers for the per-service namespace `/service/{name}`.
//!
//! Each loaded service gets its own router whose state is the
//! [`ServiceContext`] for that service, so handlers never look a service
//! up by name.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use easel_comfyui::storage::StoredArtifact;
use easel_core::service::ServiceMetadata;
use easel_core::types::ValueSet;
use serde::Serialize;

use crate::engine::orchestrator::Orchestrator;
use crate::engine::services::RegisteredService;
use crate::error::{AppError, AppResult};

/// Router state for one service.
#[derive(Clone)]
pub struct ServiceContext {
    pub service: Arc<RegisteredService>,
    pub orchestrator: Arc<Orchestrator>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Body of a successful execution.
#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub status: &'static str,
    /// Filenames of fetched artifacts, in backend order.
    pub images: Vec<String>,
    pub prompt_id: String,
    pub artifacts: Vec<StoredArtifact>,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealthResponse {
    pub status: &'static str,
    pub service: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /service/{name}/execute
///
/// Body is a JSON array of value-sets, one per mapping position.
pub async fn execute(
    State(ctx): State<ServiceContext>,
    payload: Result<Json<Vec<ValueSet>>, JsonRejection>,
) -> AppResult<Json<ExecuteResponse>> {
    let Json(inputs) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    tracing::info!(
        service = %ctx.service.name(),
        value_sets = inputs.len(),
        "Execution requested",
    );

    let outcome = ctx.orchestrator.execute(&ctx.service, &inputs).await?;

    Ok(Json(ExecuteResponse {
        status: "completed",
        images: outcome.images,
        prompt_id: outcome.prompt_id,
        artifacts: outcome.artifacts,
    }))
}

/// GET /service/{name}/health
pub async fn health(State(ctx): State<ServiceContext>) -> Json<ServiceHealthResponse> {
    Json(ServiceHealthResponse {
        status: "healthy",
        service: ctx.service.name().to_string(),
    })
}

/// GET /service/{name}/metadata
pub async fn metadata(State(ctx): State<ServiceContext>) -> Json<ServiceMetadata> {
    Json(ctx.service.definition.metadata())
}
