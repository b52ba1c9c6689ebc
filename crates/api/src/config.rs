use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use easel_comfyui::poll::PollConfig;

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{key} points to {path}, which does not exist")]
    PathNotFound { key: &'static str, path: PathBuf },

    #[error("Failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Server configuration loaded from environment variables.
///
/// Built once at startup and passed explicitly; nothing reads the
/// environment while serving requests.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8686`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `660`). Sits above the
    /// execution timeout so a slow job reports 504 rather than 408.
    pub request_timeout_secs: u64,
    /// Directory holding one subdirectory per service.
    pub service_root: PathBuf,
    /// Backend registry document (default: `comfy_servers.json`).
    pub backends_file: PathBuf,
    /// Base directory for relative `filepath` parameters.
    pub input_dir: PathBuf,
    /// Where fetched artifacts are written (default: `./outputs`).
    pub output_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    /// Deadline for submit plus polling, in seconds (default: `600`).
    pub execution_timeout_secs: u64,
    /// Per-call timeout for backend HTTP requests (default: `10`).
    pub backend_request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `HOST`                         | `0.0.0.0`               |
    /// | `PORT`                         | `8686`                  |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`         | `660`                   |
    /// | `SERVICE_ROOT`                 | required                |
    /// | `BACKENDS_FILE`                | `comfy_servers.json`    |
    /// | `INPUT_DIR`                    | required                |
    /// | `OUTPUT_DIR`                   | `./outputs`             |
    /// | `POLL_INTERVAL_MS`             | `2000`                  |
    /// | `POLL_MAX_ATTEMPTS`            | `300`                   |
    /// | `EXECUTION_TIMEOUT_SECS`       | `600`                   |
    /// | `BACKEND_REQUEST_TIMEOUT_SECS` | `10`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "0.0.0.0");
        let port = parse_var(&lookup, "PORT", 8686)?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            if let Err(e) = origin.parse::<HeaderValue>() {
                return Err(ConfigError::Invalid {
                    key: "CORS_ORIGINS",
                    value: origin.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let service_root = lookup("SERVICE_ROOT")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("SERVICE_ROOT"))?;
        let input_dir = lookup("INPUT_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing("INPUT_DIR"))?;

        let poll_max_attempts = parse_var(&lookup, "POLL_MAX_ATTEMPTS", 300)?;
        if poll_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "POLL_MAX_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 660)?,
            service_root,
            backends_file: PathBuf::from(var("BACKENDS_FILE", "comfy_servers.json")),
            input_dir,
            output_dir: PathBuf::from(var("OUTPUT_DIR", "./outputs")),
            poll_interval_ms: parse_var(&lookup, "POLL_INTERVAL_MS", 2000)?,
            poll_max_attempts,
            execution_timeout_secs: parse_var(&lookup, "EXECUTION_TIMEOUT_SECS", 600)?,
            backend_request_timeout_secs: parse_var(&lookup, "BACKEND_REQUEST_TIMEOUT_SECS", 10)?,
        })
    }

    /// Check the configured paths and create the output directory.
    pub fn prepare_filesystem(&self) -> Result<(), ConfigError> {
        require_path("SERVICE_ROOT", &self.service_root)?;
        require_path("INPUT_DIR", &self.input_dir)?;
        require_path("BACKENDS_FILE", &self.backends_file)?;

        std::fs::create_dir_all(&self.output_dir).map_err(|source| ConfigError::Io {
            path: self.output_dir.clone(),
            source,
        })
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.poll_max_attempts,
        }
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn backend_request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_request_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn require_path(key: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ConfigError::PathNotFound {
            key,
            path: path.to_path_buf(),
        })
    }
}
