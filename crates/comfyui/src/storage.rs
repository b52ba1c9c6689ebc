//! Output area for fetched artifacts.
//!
//! Files are stored by backend subfolder and filename. Each write lands in
//! a uniquely named temp file first and is then renamed into place, so a
//! reader never observes a partial file. Two jobs producing the same
//! subfolder and filename overwrite each other; the last writer wins.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

/// A fetched artifact persisted to the output directory.
///
/// Only the location relative to the output directory is serialized, so
/// responses never expose the server's filesystem layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub filename: String,
    /// Absolute location on disk.
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(rename = "path")]
    pub relative_path: PathBuf,
    pub size_bytes: u64,
}

/// Errors writing to the output area.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid artifact filename '{0}'")]
    InvalidFilename(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Process-wide artifact directory shared by all services.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write `bytes` as `<subfolder>/<filename>` below the output directory.
    /// Only the final component of `filename` is used.
    pub async fn persist(
        &self,
        subfolder: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StoredArtifact, StorageError> {
        let name = sanitize_filename(filename)?;
        let relative_dir = sanitize_subfolder(subfolder);
        let target_dir = self.output_dir.join(&relative_dir);

        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(|source| StorageError::Io {
                path: target_dir.clone(),
                source,
            })?;

        let final_path = target_dir.join(&name);
        let temp_path = target_dir.join(format!(".{name}.{}.part", uuid::Uuid::new_v4()));

        if let Err(source) = tokio::fs::write(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::Io {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StorageError::Io {
                path: final_path,
                source,
            });
        }

        Ok(StoredArtifact {
            relative_path: relative_dir.join(&name),
            filename: name,
            path: final_path,
            size_bytes: bytes.len() as u64,
        })
    }
}

/// Strip any directory components a backend-supplied name carries.
fn sanitize_filename(filename: &str) -> Result<String, StorageError> {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && !n.starts_with('.'))
        .map(str::to_string)
        .ok_or_else(|| StorageError::InvalidFilename(filename.to_string()))
}

/// Keep only plain, visible components so a subfolder can never leave the
/// output directory.
fn sanitize_subfolder(subfolder: &str) -> PathBuf {
    Path::new(subfolder)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .filter(|part| !part.starts_with('.'))
        .collect()
}
