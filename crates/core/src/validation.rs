//! Request parameter validation.
//!
//! [`validate`] walks a service's mappings in declaration order, pairing
//! mapping *i* with the value-set at position *i* of the request. It never
//! mutates the request; coerced values are returned as
//! [`ValidatedValue`]s keyed by mapping index for the binder.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::PipelineError;
use crate::mapping::{DataType, ParameterMapping};
use crate::types::ValueSet;

/// Key inside each value-set naming the node it targets.
pub const NODE_ID_KEY: &str = "node_id";

/// A value that passed validation, ready to be written into a template.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedValue {
    /// Position of the originating mapping.
    pub mapping_index: usize,
    pub node_id: String,
    pub input_field: String,
    pub value: Value,
}

/// Environment the validator checks `filepath` parameters against.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Relative file paths resolve against this directory when set.
    pub input_dir: Option<PathBuf>,
}

impl ValidationContext {
    pub fn with_input_dir(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: Some(input_dir.into()),
        }
    }

    fn resolve(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        match &self.input_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Validate and coerce `inputs` against `mappings`.
///
/// Optional mappings without a value (supplied or default) produce no
/// entry, so the result may be shorter than `mappings`.
pub fn validate(
    inputs: &[ValueSet],
    mappings: &[ParameterMapping],
    ctx: &ValidationContext,
) -> Result<Vec<ValidatedValue>, PipelineError> {
    let empty = ValueSet::new();
    let mut validated = Vec::with_capacity(mappings.len());

    for (index, mapping) in mappings.iter().enumerate() {
        let input = inputs.get(index).unwrap_or(&empty);

        if mapping.required && node_id_of(input).as_deref() != Some(mapping.node_id.as_str()) {
            return Err(PipelineError::Alignment {
                position: index,
                node_id: mapping.node_id.clone(),
            });
        }

        if mapping.required && !input.contains_key(&mapping.input_field) {
            return Err(PipelineError::MissingField {
                node_id: mapping.node_id.clone(),
                field: mapping.input_field.clone(),
            });
        }

        let supplied = input
            .get(&mapping.input_field)
            .filter(|v| !v.is_null())
            .or_else(|| mapping.default_value.as_ref().filter(|v| !v.is_null()));

        // Nothing to inject; the binder falls back to the template value
        // and enforces `required` there.
        let Some(raw) = supplied else {
            continue;
        };

        let value = coerce(raw, mapping, ctx)?;

        validated.push(ValidatedValue {
            mapping_index: index,
            node_id: mapping.node_id.clone(),
            input_field: mapping.input_field.clone(),
            value,
        });
    }

    Ok(validated)
}

/// Textual form of a value-set's `node_id`, accepting strings and numbers.
fn node_id_of(input: &ValueSet) -> Option<String> {
    match input.get(NODE_ID_KEY)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce(
    raw: &Value,
    mapping: &ParameterMapping,
    ctx: &ValidationContext,
) -> Result<Value, PipelineError> {
    let field = &mapping.input_field;
    let type_error = |expected: &'static str| PipelineError::Type {
        field: field.clone(),
        expected,
        value: raw.to_string(),
    };

    match &mapping.data_type {
        DataType::Int => coerce_int(raw).ok_or_else(|| type_error("int")),
        DataType::Float => coerce_float(raw).ok_or_else(|| type_error("float")),
        DataType::Bool => coerce_bool(raw).ok_or_else(|| type_error("bool")),
        DataType::String => Ok(Value::String(match raw {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })),
        DataType::FilePath => {
            let Value::String(path) = raw else {
                return Err(PipelineError::PathNotFound {
                    path: raw.to_string(),
                });
            };
            if path.is_empty() || !ctx.resolve(path).exists() {
                return Err(PipelineError::PathNotFound { path: path.clone() });
            }
            Ok(raw.clone())
        }
        DataType::Unknown(tag) => Err(PipelineError::UnknownType {
            field: field.clone(),
            data_type: tag.clone(),
        }),
    }
}

fn coerce_int(raw: &Value) -> Option<Value> {
    match raw {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(raw.clone()),
        Value::Number(n) => {
            let f = n.as_f64()?;
            (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .then(|| Value::from(f as i64))
        }
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn coerce_float(raw: &Value) -> Option<Value> {
    let f = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    serde_json::Number::from_f64(f).map(Value::Number)
}

fn coerce_bool(raw: &Value) -> Option<Value> {
    match raw {
        Value::Bool(_) => Some(raw.clone()),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
        _ => None,
    }
}
