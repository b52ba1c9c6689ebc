use std::path::PathBuf;

/// Errors raised while loading process-wide configuration documents
/// (backend registry, service definitions).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} named '{name}'")]
    NotFound { entity: &'static str, name: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Request-scoped failures from the validation and binding stages.
///
/// Every variant except [`PipelineError::UnknownNode`] is the caller's
/// fault and maps to a 4xx response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    /// The value-set at a mapping's position names a different node.
    #[error("Input at position {position} does not align with mapping node '{node_id}'")]
    Alignment { position: usize, node_id: String },

    #[error("Missing input field '{field}' for node '{node_id}'")]
    MissingField { node_id: String, field: String },

    #[error("Parameter '{field}' requires a value of type {expected}, got {value}")]
    Type {
        field: String,
        expected: &'static str,
        value: String,
    },

    #[error("File path does not exist: {path}")]
    PathNotFound { path: String },

    #[error("Unknown data type '{data_type}' for parameter '{field}'")]
    UnknownType { field: String, data_type: String },

    #[error("Node '{node_id}' is missing required parameter '{field}'")]
    MissingRequiredParameter { node_id: String, field: String },

    /// A mapping addresses a node the template does not contain. Service
    /// loading rejects this, so reaching it means the template changed
    /// underneath a loaded definition.
    #[error("Template has no node '{node_id}'")]
    UnknownNode { node_id: String },
}

impl PipelineError {
    /// Whether the error was caused by the request rather than the service
    /// configuration.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PipelineError::UnknownNode { .. })
    }
}
