/// One user-supplied value-set: a JSON object carrying `node_id` plus the
/// input fields destined for that node.
pub type ValueSet = serde_json::Map<String, serde_json::Value>;

/// Node identifiers are the string keys of a job template.
pub type NodeId = String;
