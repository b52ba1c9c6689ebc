//! Route definitions for one service, mounted at `/service/{name}`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::service::{self, ServiceContext};

/// ```text
/// POST   /execute           -> execute
/// GET    /health            -> health
/// GET    /metadata          -> metadata
/// ```
pub fn router() -> Router<ServiceContext> {
    Router::new()
        .route("/execute", post(service::execute))
        .route("/health", get(service::health))
        .route("/metadata", get(service::metadata))
}
