//! Routable services: each loaded definition paired with the backend
//! client that executes its jobs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use easel_comfyui::api::ComfyUIApiError;
use easel_comfyui::executor::{ComfyUIExecutor, RenderBackend};
use easel_comfyui::storage::ArtifactStore;
use easel_core::registry::{LoadFailure, ServiceRegistry};
use easel_core::service::ServiceDefinition;

/// A service ready to accept requests.
#[derive(Clone)]
pub struct RegisteredService {
    pub definition: Arc<ServiceDefinition>,
    pub backend: Arc<dyn RenderBackend>,
}

impl RegisteredService {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// All routable services plus the ones that failed to load.
#[derive(Clone, Default)]
pub struct ServiceTable {
    services: BTreeMap<String, Arc<RegisteredService>>,
    failed: Vec<LoadFailure>,
}

impl ServiceTable {
    /// Attach a ComfyUI executor to every loaded service.
    ///
    /// Services naming the same backend share one executor (and so one
    /// HTTP connection pool).
    pub fn build(
        registry: &ServiceRegistry,
        store: &ArtifactStore,
        request_timeout: Duration,
    ) -> Result<Self, ComfyUIApiError> {
        let mut executors: HashMap<String, Arc<dyn RenderBackend>> = HashMap::new();
        let mut services = Vec::with_capacity(registry.len());

        for definition in registry.iter() {
            let backend = match executors.get(definition.backend_id()) {
                Some(existing) => Arc::clone(existing),
                None => {
                    let executor = ComfyUIExecutor::new(
                        Arc::clone(&definition.backend),
                        store.clone(),
                        request_timeout,
                    )?;
                    tracing::debug!(
                        backend = %definition.backend_id(),
                        url = %definition.backend.base_url(),
                        "Backend client created",
                    );
                    let executor: Arc<dyn RenderBackend> = Arc::new(executor);
                    executors.insert(definition.backend_id().to_string(), Arc::clone(&executor));
                    executor
                }
            };

            services.push(RegisteredService {
                definition: Arc::clone(definition),
                backend,
            });
        }

        Ok(Self::from_parts(services, registry.report().failed.clone()))
    }

    /// Build a table from already-paired services.
    pub fn from_parts(
        services: impl IntoIterator<Item = RegisteredService>,
        failed: Vec<LoadFailure>,
    ) -> Self {
        let services = services
            .into_iter()
            .map(|s| (s.name().to_string(), Arc::new(s)))
            .collect();
        Self { services, failed }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredService>> {
        self.services.get(name)
    }

    /// Services in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredService>> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn failed(&self) -> &[LoadFailure] {
        &self.failed
    }
}
