//! Shared fixtures for the gateway integration tests: an in-process stub
//! ComfyUI server, an on-disk service tree, and the full application
//! router built the same way `main.rs` builds it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get as get_route, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use easel_api::app::build_router;
use easel_api::config::ServerConfig;
use easel_api::engine::orchestrator::Orchestrator;
use easel_api::engine::services::ServiceTable;
use easel_api::state::AppState;
use easel_comfyui::storage::ArtifactStore;
use easel_core::backend::BackendRegistry;
use easel_core::registry::discover;

// ---------------------------------------------------------------------------
// Stub ComfyUI backend
// ---------------------------------------------------------------------------

/// Counters and captured requests of the stub backend.
#[derive(Clone, Default)]
pub struct StubBackend {
    /// History polls answered with `{}` before the job reports completion.
    pub pending_polls: usize,
    pub polls: Arc<AtomicUsize>,
    pub views: Arc<AtomicUsize>,
    pub submitted: Arc<Mutex<Option<Value>>>,
}

impl StubBackend {
    pub fn new(pending_polls: usize) -> Self {
        Self {
            pending_polls,
            ..Default::default()
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn views(&self) -> usize {
        self.views.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Option<Value> {
        self.submitted.lock().unwrap().clone()
    }
}

async fn stub_submit(State(stub): State<StubBackend>, Json(body): Json<Value>) -> Json<Value> {
    *stub.submitted.lock().unwrap() = Some(body);
    Json(json!({ "prompt_id": "abc", "number": 0 }))
}

async fn stub_history(State(stub): State<StubBackend>, UrlPath(id): UrlPath<String>) -> Json<Value> {
    let n = stub.polls.fetch_add(1, Ordering::SeqCst);
    if n < stub.pending_polls {
        return Json(json!({}));
    }
    Json(json!({
        id: {
            "outputs": {
                "9": { "images": [ { "filename": "out.png", "subfolder": "", "type": "output" } ] }
            },
            "status": { "status_str": "success", "completed": true, "messages": [] }
        }
    }))
}

async fn stub_view(
    State(stub): State<StubBackend>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    stub.views.fetch_add(1, Ordering::SeqCst);
    let filename = params.get("filename").cloned().unwrap_or_default();
    (StatusCode::OK, format!("bytes:{filename}").into_bytes())
}

/// Serve `stub` on an ephemeral port and return the port.
pub async fn start_stub(stub: StubBackend) -> u16 {
    let app = Router::new()
        .route("/prompt", post(stub_submit))
        .route("/history/{id}", get_route(stub_history))
        .route("/view", get_route(stub_view))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

// ---------------------------------------------------------------------------
// Service tree
// ---------------------------------------------------------------------------

/// Write `Echo` (one required string mapping into node 1), `Seeded`
/// (optional int seed with a template default) and `Broken` (no
/// config.json) under `root`.
pub fn write_services(root: &Path) {
    let echo = root.join("Echo");
    std::fs::create_dir_all(&echo).unwrap();
    std::fs::write(
        echo.join("workflow.json"),
        json!({
            "1": { "class_type": "Echo", "inputs": { "text": "" } },
            "9": { "class_type": "SaveImage", "inputs": { "images": ["1", 0] } }
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        echo.join("config.json"),
        json!({
            "backend_id": "stub",
            "version": "2.1",
            "description": "Echoes text into an image",
            "input_mappings": [
                { "node_id": "1", "input_field": "text", "data_type": "string", "required": true,
                  "description": "Text to render" }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let seeded = root.join("Seeded");
    std::fs::create_dir_all(&seeded).unwrap();
    std::fs::write(
        seeded.join("workflow.json"),
        json!({
            "3": { "class_type": "KSampler", "inputs": { "seed": 42, "steps": 20 } },
            "9": { "class_type": "SaveImage", "inputs": { "images": ["3", 0] } }
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        seeded.join("config.json"),
        json!({
            "server": "stub",
            "input_mappings": [
                { "node_id": "3", "input_field": "seed", "data_type": "int" }
            ]
        })
        .to_string(),
    )
    .unwrap();

    let broken = root.join("Broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("workflow.json"), "{}").unwrap();

    std::fs::create_dir_all(root.join("_shared")).unwrap();
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// A running gateway over a temporary service tree.
pub struct TestApp {
    pub router: Router,
    pub dir: TempDir,
    pub stub: StubBackend,
    pub shutdown: CancellationToken,
}

/// Build a test `ServerConfig` rooted at `dir` with fast polling.
pub fn test_config(dir: &Path, poll_max_attempts: u32) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        service_root: dir.join("services"),
        backends_file: dir.join("comfy_servers.json"),
        input_dir: dir.join("inputs"),
        output_dir: dir.join("outputs"),
        poll_interval_ms: 5,
        poll_max_attempts,
        execution_timeout_secs: 10,
        backend_request_timeout_secs: 5,
    }
}

/// Build the full application against a fresh stub backend.
pub async fn build_test_app(stub: StubBackend, poll_max_attempts: u32) -> TestApp {
    let port = start_stub(stub.clone()).await;
    let dir = tempfile::tempdir().unwrap();

    std::fs::create_dir_all(dir.path().join("services")).unwrap();
    std::fs::create_dir_all(dir.path().join("inputs")).unwrap();
    write_services(&dir.path().join("services"));
    std::fs::write(
        dir.path().join("comfy_servers.json"),
        json!({ "servers": [ { "name": "stub", "host": "127.0.0.1", "port": port, "upload_dir": "/tmp" } ] })
            .to_string(),
    )
    .unwrap();

    let config = test_config(dir.path(), poll_max_attempts);
    config.prepare_filesystem().unwrap();

    let backends = BackendRegistry::load(&config.backends_file).unwrap();
    let registry = discover(&config.service_root, &backends).unwrap();
    let services = ServiceTable::build(
        &registry,
        &ArtifactStore::new(&config.output_dir),
        config.backend_request_timeout(),
    )
    .unwrap();

    let shutdown = CancellationToken::new();
    let state = AppState {
        orchestrator: Arc::new(Orchestrator::from_config(&config, shutdown.clone())),
        config: Arc::new(config),
        services: Arc::new(services),
    };

    TestApp {
        router: build_router(state),
        dir,
        stub,
        shutdown,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
