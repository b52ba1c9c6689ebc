//! Service definitions: one job template + parameter mappings + backend,
//! exposed under a route namespace.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendEndpoint, BackendRegistry};
use crate::error::CoreError;
use crate::mapping::{ParameterDescriptor, ParameterMapping};
use crate::template::JobTemplate;

/// Version reported when a service config does not declare one.
pub const DEFAULT_SERVICE_VERSION: &str = "1.0";

/// Maximum length of a service name.
pub const MAX_SERVICE_NAME_LENGTH: usize = 100;

fn default_version() -> String {
    DEFAULT_SERVICE_VERSION.to_string()
}

/// Contents of a service's `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name of the backend in the backend registry.
    #[serde(alias = "server")]
    pub backend_id: String,
    #[serde(default)]
    pub input_mappings: Vec<ParameterMapping>,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A fully loaded, validated service. Immutable once built.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub backend: Arc<BackendEndpoint>,
    pub template: JobTemplate,
    pub mappings: Vec<ParameterMapping>,
}

/// Public description of a service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetadata {
    pub service_name: String,
    pub version: String,
    pub description: String,
    pub backend: String,
    pub input_parameters: Vec<ParameterDescriptor>,
}

impl ServiceDefinition {
    /// Assemble a definition, checking the name, every mapping against the
    /// template, and the backend reference.
    pub fn new(
        name: &str,
        template: JobTemplate,
        config: ServiceConfig,
        backends: &BackendRegistry,
    ) -> Result<Self, CoreError> {
        validate_service_name(name)?;

        for (index, mapping) in config.input_mappings.iter().enumerate() {
            if mapping.input_field.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Mapping {index} has an empty input_field"
                )));
            }
            if !template.contains_node(&mapping.node_id) {
                return Err(CoreError::Validation(format!(
                    "Mapping {index} references node '{}' which is not in the template",
                    mapping.node_id
                )));
            }
        }

        let backend = backends.resolve(&config.backend_id)?;

        Ok(Self {
            name: name.to_string(),
            version: config.version,
            description: config.description,
            backend,
            template,
            mappings: config.input_mappings,
        })
    }

    pub fn backend_id(&self) -> &str {
        &self.backend.name
    }

    pub fn metadata(&self) -> ServiceMetadata {
        ServiceMetadata {
            service_name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone().unwrap_or_default(),
            backend: self.backend.name.clone(),
            input_parameters: self.mappings.iter().map(ParameterDescriptor::from).collect(),
        }
    }
}

/// A service name becomes a URL path segment, so it is restricted to ASCII
/// alphanumerics, `-` and `_`, and may not start with `_`.
pub fn validate_service_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Service name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_SERVICE_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Service name must be at most {MAX_SERVICE_NAME_LENGTH} characters, got {}",
            name.len()
        )));
    }
    if name.starts_with('_') {
        return Err(CoreError::Validation(format!(
            "Service name '{name}' must not start with '_'"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "Service name '{name}' may only contain ASCII letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}
