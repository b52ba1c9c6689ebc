//! Parameter mappings: where a user-supplied value lands in a job
//! template and how it is typed.

use serde::{Deserialize, Serialize};

use crate::types::NodeId;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Declared type of a mapped parameter.
///
/// Unrecognized tags are kept rather than rejected at load time so that a
/// service with a typo still loads; requests against that mapping fail
/// with an unknown-type error instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Int,
    Float,
    Bool,
    String,
    FilePath,
    Unknown(String),
}

impl DataType {
    /// Canonical tag as written in service config files.
    pub fn as_str(&self) -> &str {
        match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Bool => "bool",
            DataType::String => "string",
            DataType::FilePath => "filepath",
            DataType::Unknown(tag) => tag,
        }
    }
}

impl From<String> for DataType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "int" => DataType::Int,
            "float" => DataType::Float,
            "bool" => DataType::Bool,
            "string" | "str" => DataType::String,
            "filepath" => DataType::FilePath,
            _ => DataType::Unknown(tag),
        }
    }
}

impl From<DataType> for String {
    fn from(data_type: DataType) -> Self {
        data_type.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// Binding from one external parameter to a node input in a job template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterMapping {
    /// Template node that receives the value.
    pub node_id: NodeId,
    /// Field inside the node's `inputs` object.
    pub input_field: String,
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    /// Used when the request omits the field.
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Public description of a mapping, as returned by service metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub node_id: NodeId,
    #[serde(rename = "type")]
    pub data_type: String,
    pub required: bool,
    pub description: String,
}

impl From<&ParameterMapping> for ParameterDescriptor {
    fn from(mapping: &ParameterMapping) -> Self {
        Self {
            name: mapping.input_field.clone(),
            node_id: mapping.node_id.clone(),
            data_type: mapping.data_type.as_str().to_string(),
            required: mapping.required,
            description: mapping.description.clone().unwrap_or_default(),
        }
    }
}
