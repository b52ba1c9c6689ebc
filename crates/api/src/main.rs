use std::net::{IpAddr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use easel_api::app::build_router;
use easel_api::config::{ConfigError, ServerConfig};
use easel_api::engine::orchestrator::Orchestrator;
use easel_api::engine::services::ServiceTable;
use easel_api::state::AppState;
use easel_comfyui::api::ComfyUIApiError;
use easel_comfyui::storage::ArtifactStore;
use easel_core::backend::BackendRegistry;
use easel_core::error::CoreError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "easel_api=debug,easel_comfyui=debug,easel_core=info,tower_http=debug";

/// Anything that stops the server from starting or running.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] CoreError),

    #[error("Failed to create backend client: {0}")]
    Client(#[from] ComfyUIApiError),

    #[error("Invalid HOST address '{0}'")]
    Host(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    config.prepare_filesystem()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        service_root = %config.service_root.display(),
        output_dir = %config.output_dir.display(),
        "Loaded server configuration",
    );

    // --- Backends ---
    let backends = BackendRegistry::load(&config.backends_file)?;
    tracing::info!(count = backends.len(), "Backend registry loaded");

    // --- Services ---
    let registry = easel_core::registry::discover(&config.service_root, &backends)?;
    let store = ArtifactStore::new(&config.output_dir);
    let services = ServiceTable::build(&registry, &store, config.backend_request_timeout())?;
    tracing::info!(
        loaded = services.len(),
        failed = services.failed().len(),
        "Services registered",
    );

    // --- App state ---
    let shutdown = CancellationToken::new();
    let orchestrator = Orchestrator::from_config(&config, shutdown.clone());
    let state = AppState {
        config: Arc::new(config.clone()),
        services: Arc::new(services),
        orchestrator: Arc::new(orchestrator),
    };

    let app = build_router(state);

    // --- Start server ---
    let ip: IpAddr = config
        .host
        .parse()
        .map_err(|_| StartupError::Host(config.host.clone()))?;
    let addr = SocketAddr::new(ip, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Stop in-flight poll loops so draining connections can finish.
            shutdown.cancel();
        })
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
