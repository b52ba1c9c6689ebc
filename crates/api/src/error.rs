use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use easel_comfyui::executor::BackendError;
use easel_core::error::PipelineError;
use serde_json::json;

use crate::engine::orchestrator::ExecutionError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of the request pipeline and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Validation or binding rejected the request.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The backend could not run the job.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Pipeline(e) => AppError::Pipeline(e),
            ExecutionError::Backend(e) => AppError::Backend(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- Request pipeline ---
            AppError::Pipeline(err) => match err {
                PipelineError::MissingRequiredParameter { .. } => {
                    (StatusCode::BAD_REQUEST, "BINDING_ERROR", err.to_string())
                }
                _ if err.is_client_error() => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
                }
                _ => {
                    tracing::error!(error = %err, "Service template does not match its mappings");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "TEMPLATE_ERROR",
                        err.to_string(),
                    )
                }
            },

            // --- Backend ---
            AppError::Backend(err) => {
                let (status, code) = match err {
                    BackendError::Submission(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "SUBMISSION_FAILED")
                    }
                    BackendError::ExecutionFailed { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "EXECUTION_FAILED")
                    }
                    BackendError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
                    BackendError::Cancelled { .. } => {
                        (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN")
                    }
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %err, "Backend error");
                }
                (status, code, err.to_string())
            }

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
