//! Job templates: the node graph submitted to the rendering backend.
//!
//! A template is an object keyed by node ID, each node carrying an
//! `inputs` object:
//!
//! ```json
//! {
//!   "6": { "class_type": "CLIPTextEncode", "inputs": { "text": "a cat" } }
//! }
//! ```
//!
//! Loaded templates are shared read-only between requests; binding always
//! works on a [`Clone`], which is a full structural copy.

use serde::Serialize;

use crate::error::CoreError;

/// Name of the per-node object holding input values.
pub const INPUTS_KEY: &str = "inputs";

/// A parsed job template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobTemplate(serde_json::Map<String, serde_json::Value>);

impl JobTemplate {
    /// Build a template from a JSON document, rejecting anything that is not
    /// a non-empty object of node objects.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CoreError> {
        let serde_json::Value::Object(nodes) = value else {
            return Err(CoreError::Validation(
                "Job template must be a JSON object".to_string(),
            ));
        };

        if nodes.is_empty() {
            return Err(CoreError::Validation(
                "Job template must contain at least one node".to_string(),
            ));
        }

        if let Some((node_id, _)) = nodes.iter().find(|(_, node)| !node.is_object()) {
            return Err(CoreError::Validation(format!(
                "Template node '{node_id}' must be a JSON object"
            )));
        }

        Ok(Self(nodes))
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.0.contains_key(node_id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Current value of `node_id.inputs.field`, if any. JSON `null` counts
    /// as absent.
    pub fn input(&self, node_id: &str, field: &str) -> Option<&serde_json::Value> {
        self.0
            .get(node_id)?
            .get(INPUTS_KEY)?
            .get(field)
            .filter(|v| !v.is_null())
    }

    /// Overwrite `node_id.inputs.field`, creating the `inputs` object when
    /// the node has none. Returns `false` if the node does not exist.
    pub fn set_input(&mut self, node_id: &str, field: &str, value: serde_json::Value) -> bool {
        let Some(serde_json::Value::Object(node)) = self.0.get_mut(node_id) else {
            return false;
        };

        let inputs = node
            .entry(INPUTS_KEY)
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));

        if !inputs.is_object() {
            *inputs = serde_json::Value::Object(serde_json::Map::new());
        }

        if let serde_json::Value::Object(map) = inputs {
            map.insert(field.to_string(), value);
        }
        true
    }

    pub fn as_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone())
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> JobTemplate {
        JobTemplate::from_value(json!({
            "3": { "class_type": "KSampler", "inputs": { "seed": 42, "cfg": 7.5 } },
            "9": { "class_type": "SaveImage" }
        }))
        .unwrap()
    }

    #[test]
    fn rejects_non_object() {
        let err = JobTemplate::from_value(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("must be a JSON object"));
    }

    #[test]
    fn rejects_empty_object() {
        let err = JobTemplate::from_value(json!({})).unwrap_err();
        assert!(err.to_string().contains("at least one node"));
    }

    #[test]
    fn rejects_scalar_node() {
        let err = JobTemplate::from_value(json!({ "1": 5 })).unwrap_err();
        assert!(err.to_string().contains("'1'"));
    }

    #[test]
    fn reads_existing_input() {
        let t = template();
        assert_eq!(t.input("3", "seed"), Some(&json!(42)));
        assert_eq!(t.input("3", "steps"), None);
        assert_eq!(t.input("9", "images"), None);
        assert_eq!(t.input("404", "seed"), None);
    }

    #[test]
    fn set_input_creates_missing_inputs_object() {
        let mut t = template();
        assert!(t.set_input("9", "filename_prefix", json!("out")));
        assert_eq!(t.input("9", "filename_prefix"), Some(&json!("out")));
    }

    #[test]
    fn set_input_on_unknown_node_is_refused() {
        let mut t = template();
        assert!(!t.set_input("404", "seed", json!(1)));
        assert!(!t.contains_node("404"));
    }

    #[test]
    fn clone_is_independent() {
        let original = template();
        let mut copy = original.clone();
        copy.set_input("3", "seed", json!(7));
        assert_eq!(original.input("3", "seed"), Some(&json!(42)));
        assert_eq!(copy.input("3", "seed"), Some(&json!(7)));
    }

    #[test]
    fn node_order_is_preserved() {
        let t = JobTemplate::from_value(json!({
            "10": { "inputs": {} },
            "2": { "inputs": {} },
            "1": { "inputs": {} }
        }))
        .unwrap();
        assert_eq!(t.node_ids().collect::<Vec<_>>(), vec!["10", "2", "1"]);
    }
}
