//! Startup discovery of service definitions.
//!
//! Each subdirectory of the service root is one service:
//!
//! ```text
//! services/
//!   GenerateStory/
//!     workflow.json   job template
//!     config.json     mappings + backend
//! ```
//!
//! Discovery first builds a registration table of [`ServiceEntry`]
//! triples, then loads each entry independently. A broken service is
//! recorded in the [`LoadReport`] and never stops the others from loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::backend::BackendRegistry;
use crate::error::CoreError;
use crate::service::{ServiceConfig, ServiceDefinition};
use crate::template::JobTemplate;

/// Job template file inside a service directory.
pub const TEMPLATE_FILE: &str = "workflow.json";

/// Mapping/config file inside a service directory.
pub const CONFIG_FILE: &str = "config.json";

/// Directory name prefixes that are never treated as services.
const RESERVED_PREFIXES: &[char] = &['_', '.'];

/// One row of the registration table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,
    pub template_path: PathBuf,
    pub config_path: PathBuf,
}

/// A service that failed to load, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadFailure {
    pub name: String,
    pub reason: String,
}

/// Outcome of discovery for every candidate directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<LoadFailure>,
}

/// Loaded services, keyed (and iterated) by name.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<String, Arc<ServiceDefinition>>,
    report: LoadReport,
}

impl ServiceRegistry {
    pub fn get(&self, name: &str) -> Option<&Arc<ServiceDefinition>> {
        self.services.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ServiceDefinition>> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }
}

/// Discover and load every service under `root`.
///
/// Only an unreadable `root` is an error; per-service problems go into the
/// report.
pub fn discover(root: &Path, backends: &BackendRegistry) -> Result<ServiceRegistry, CoreError> {
    let (entries, mut failed) = scan(root)?;

    let mut services = BTreeMap::new();
    let mut loaded = Vec::new();

    for entry in entries {
        match load_service(&entry, backends) {
            Ok(definition) => {
                tracing::info!(
                    service = %entry.name,
                    backend = %definition.backend_id(),
                    mappings = definition.mappings.len(),
                    nodes = definition.template.len(),
                    "Service loaded",
                );
                loaded.push(entry.name.clone());
                services.insert(entry.name, Arc::new(definition));
            }
            Err(e) => {
                tracing::warn!(service = %entry.name, error = %e, "Service failed to load");
                failed.push(LoadFailure {
                    name: entry.name,
                    reason: e.to_string(),
                });
            }
        }
    }

    failed.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::info!(
        loaded = loaded.len(),
        failed = failed.len(),
        root = %root.display(),
        "Service discovery complete",
    );

    Ok(ServiceRegistry {
        services,
        report: LoadReport { loaded, failed },
    })
}

/// Build the registration table for `root`.
///
/// Directories missing either required file are returned as failures
/// instead of entries.
pub fn scan(root: &Path) -> Result<(Vec<ServiceEntry>, Vec<LoadFailure>), CoreError> {
    let read_dir = std::fs::read_dir(root).map_err(|source| CoreError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    let mut failed = Vec::new();

    for dir_entry in read_dir {
        let dir_entry = dir_entry.map_err(|source| CoreError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let name = dir_entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(RESERVED_PREFIXES) {
            tracing::debug!(entry = %name, "Skipping reserved directory");
            continue;
        }

        let path = dir_entry.path();
        if !path.is_dir() {
            continue;
        }

        let template_path = path.join(TEMPLATE_FILE);
        let config_path = path.join(CONFIG_FILE);

        let missing: Vec<&str> = [(TEMPLATE_FILE, &template_path), (CONFIG_FILE, &config_path)]
            .into_iter()
            .filter(|(_, p)| !p.is_file())
            .map(|(file, _)| file)
            .collect();

        if !missing.is_empty() {
            let reason = format!("Missing {}", missing.join(", "));
            tracing::warn!(service = %name, %reason, "Skipping incomplete service directory");
            failed.push(LoadFailure { name, reason });
            continue;
        }

        entries.push(ServiceEntry {
            name,
            template_path,
            config_path,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((entries, failed))
}

/// Load one registration-table entry into a definition.
pub fn load_service(
    entry: &ServiceEntry,
    backends: &BackendRegistry,
) -> Result<ServiceDefinition, CoreError> {
    let template_json: serde_json::Value = read_json(&entry.template_path)?;
    let template = JobTemplate::from_value(template_json)?;
    let config: ServiceConfig = read_json(&entry.config_path)?;
    ServiceDefinition::new(&entry.name, template, config, backends)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
