//! Job status and output descriptors parsed from ComfyUI history.
//!
//! `GET /history/{prompt_id}` returns:
//!
//! ```json
//! {
//!   "<prompt_id>": {
//!     "outputs": { "9": { "images": [ { "filename": "out.png", "subfolder": "", "type": "output" } ] } },
//!     "status": { "status_str": "success", "completed": true, "messages": [] }
//!   }
//! }
//! ```

use serde::Serialize;
use serde_json::Value;

/// Status text reported when the history call itself failed, and by
/// ComfyUI when execution failed.
pub const STATUS_ERROR: &str = "error";

/// Status text used when the backend has no status for the job yet.
pub const STATUS_UNKNOWN: &str = "unknown";

/// Format hint sent on `/view` requests.
pub const DEFAULT_ARTIFACT_FORMAT: &str = ".png";

/// One output file reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub subfolder: String,
    /// ComfyUI folder type (`output`, `temp`, `input`).
    pub kind: String,
    pub format: String,
    /// Node that produced the file.
    pub owning_node_id: String,
}

/// Snapshot of a job's progress on the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub job_id: String,
    pub completed: bool,
    pub status_text: String,
    pub artifacts_meta: Vec<ArtifactMeta>,
    /// Raw `status.messages` from the backend.
    pub messages: Vec<Value>,
    /// Transport-level failure while polling. `None` when the backend
    /// answered.
    pub error: Option<String>,
}

impl JobStatus {
    /// Status for a poll that could not reach the backend.
    pub fn transport_error(job_id: &str, cause: impl ToString) -> Self {
        Self {
            job_id: job_id.to_string(),
            completed: false,
            status_text: STATUS_ERROR.to_string(),
            artifacts_meta: Vec::new(),
            messages: Vec::new(),
            error: Some(cause.to_string()),
        }
    }

    /// The backend answered and reported that execution failed.
    pub fn is_failed(&self) -> bool {
        !self.completed && self.error.is_none() && self.status_text == STATUS_ERROR
    }

    /// Best-effort description of a backend execution failure, taken from
    /// the `execution_error` status message when present.
    pub fn failure_reason(&self) -> String {
        self.messages
            .iter()
            .filter_map(Value::as_array)
            .filter(|pair| pair.first().and_then(Value::as_str) == Some("execution_error"))
            .find_map(|pair| {
                let data = pair.get(1)?;
                let message = data.get("exception_message")?.as_str()?;
                let node = data.get("node_id").and_then(Value::as_str).unwrap_or("?");
                Some(format!("node {node}: {}", message.trim()))
            })
            .unwrap_or_else(|| format!("backend reported status '{}'", self.status_text))
    }
}

/// Interpret a `/history/{job_id}` response body.
///
/// A body without an entry for `job_id` means the job is still queued.
/// Output descriptors missing a filename are skipped.
pub fn parse_history(job_id: &str, history: &Value) -> JobStatus {
    let entry = history.get(job_id);
    let status = entry.and_then(|e| e.get("status"));

    let completed = status
        .and_then(|s| s.get("completed"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let status_text = status
        .and_then(|s| s.get("status_str"))
        .and_then(Value::as_str)
        .unwrap_or(STATUS_UNKNOWN)
        .to_string();

    let messages = status
        .and_then(|s| s.get("messages"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut artifacts_meta = Vec::new();
    if let Some(outputs) = entry.and_then(|e| e.get("outputs")).and_then(Value::as_object) {
        for (node_id, node_output) in outputs {
            let Some(images) = node_output.get("images").and_then(Value::as_array) else {
                continue;
            };
            for image in images {
                match artifact_from_descriptor(node_id, image) {
                    Some(meta) => artifacts_meta.push(meta),
                    None => tracing::warn!(
                        job_id,
                        node_id = %node_id,
                        descriptor = %image,
                        "Skipping malformed output descriptor",
                    ),
                }
            }
        }
    }

    JobStatus {
        job_id: job_id.to_string(),
        completed,
        status_text,
        artifacts_meta,
        messages,
        error: None,
    }
}

fn artifact_from_descriptor(node_id: &str, image: &Value) -> Option<ArtifactMeta> {
    let filename = image.get("filename")?.as_str()?.to_string();
    let str_field = |key: &str, default: &str| {
        image
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };

    Some(ArtifactMeta {
        filename,
        subfolder: str_field("subfolder", ""),
        kind: str_field("type", "output"),
        format: str_field("format", DEFAULT_ARTIFACT_FORMAT),
        owning_node_id: node_id.to_string(),
    })
}
