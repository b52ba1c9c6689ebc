//! Named rendering backends.
//!
//! Backends are declared once in a registry document shared by all
//! services:
//!
//! ```json
//! { "servers": [ { "name": "server_a", "host": "10.0.0.5", "port": 8188, "upload_dir": "/data/input" } ] }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Network identity of one rendering backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendEndpoint {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Directory on the backend host where it reads uploaded inputs.
    pub upload_dir: String,
}

impl BackendEndpoint {
    /// Base HTTP URL, e.g. `http://10.0.0.5:8188`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
struct BackendRegistryDocument {
    servers: Vec<BackendEndpoint>,
}

/// All configured backends, keyed by name. Read-only after startup.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<BackendEndpoint>>,
}

impl BackendRegistry {
    /// Load the registry document at `path`.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: BackendRegistryDocument =
            serde_json::from_str(&raw).map_err(|source| CoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_endpoints(doc.servers)
    }

    /// Build a registry from endpoints, rejecting duplicate names.
    pub fn from_endpoints(
        endpoints: impl IntoIterator<Item = BackendEndpoint>,
    ) -> Result<Self, CoreError> {
        let mut backends = HashMap::new();
        for endpoint in endpoints {
            if endpoint.name.trim().is_empty() {
                return Err(CoreError::Validation(
                    "Backend name must not be empty".to_string(),
                ));
            }
            let name = endpoint.name.clone();
            if backends.insert(name.clone(), Arc::new(endpoint)).is_some() {
                return Err(CoreError::Validation(format!(
                    "Duplicate backend name '{name}'"
                )));
            }
        }
        Ok(Self { backends })
    }

    /// Resolve a backend by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<BackendEndpoint>, CoreError> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "Backend",
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
