use axum::extract::State;
use axum::{routing::get, Json, Router};
use easel_core::registry::LoadFailure;
use easel_core::service::ServiceMetadata;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

/// Service listing payload.
#[derive(Serialize)]
pub struct ServiceListing {
    pub services: Vec<ServiceMetadata>,
    pub failed: Vec<LoadFailure>,
}

/// GET /services -- metadata of every routable service, in name order,
/// plus the directories that failed to load.
async fn list_services(State(state): State<AppState>) -> Json<DataResponse<ServiceListing>> {
    let services = state
        .services
        .iter()
        .map(|s| s.definition.metadata())
        .collect();

    Json(DataResponse {
        data: ServiceListing {
            services,
            failed: state.services.failed().to_vec(),
        },
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/services", get(list_services))
}
