pub mod health;
pub mod service;
pub mod services;

use std::sync::Arc;

use axum::Router;

use crate::handlers::service::ServiceContext;
use crate::state::AppState;

/// Build the gateway route tree.
///
/// Route hierarchy:
///
/// ```text
/// /health                          gateway health
/// /services                        loaded services and load failures
///
/// /service/{name}/execute          run a job (POST)
/// /service/{name}/health           service health
/// /service/{name}/metadata         service description
/// ```
///
/// Only services that loaded get a `/service/{name}` subtree; any other
/// name falls through to 404.
pub fn gateway_routes(state: &AppState) -> Router<AppState> {
    let mut router = Router::new()
        .merge(health::router())
        .merge(services::router());

    for registered in state.services.iter() {
        let ctx = ServiceContext {
            service: Arc::clone(registered),
            orchestrator: Arc::clone(&state.orchestrator),
        };
        let prefix = format!("/service/{}", registered.name());
        tracing::debug!(route = %prefix, "Mounting service routes");
        router = router.nest(&prefix, service::router().with_state(ctx));
    }

    router
}
