use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::orchestrator::Orchestrator;
use crate::engine::services::ServiceTable;

/// Shared application state available to root-level handlers via
/// `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Routable services, fixed at startup.
    pub services: Arc<ServiceTable>,
    /// Request pipeline shared by every service.
    pub orchestrator: Arc<Orchestrator>,
}
