//! Integration tests for the per-service endpoints, driven through the
//! full router against a stub ComfyUI backend.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, build_test_app, get, post_json, StubBackend};
use serde_json::json;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// health / metadata
// ---------------------------------------------------------------------------

#[tokio::test]
async fn service_health_names_the_service() {
    let app = build_test_app(StubBackend::new(0), 10).await;
    let response = get(app.router, "/service/Echo/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, json!({ "status": "healthy", "service": "Echo" }));
}

#[tokio::test]
async fn metadata_describes_parameters() {
    let app = build_test_app(StubBackend::new(0), 10).await;
    let response = get(app.router, "/service/Echo/metadata").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["service_name"], "Echo");
    assert_eq!(json["version"], "2.1");
    assert_eq!(json["description"], "Echoes text into an image");
    assert_eq!(json["backend"], "stub");
    assert_eq!(
        json["input_parameters"],
        json!([{
            "name": "text",
            "node_id": "1",
            "type": "string",
            "required": true,
            "description": "Text to render"
        }])
    );
}

#[tokio::test]
async fn metadata_defaults_version_and_description() {
    let app = build_test_app(StubBackend::new(0), 10).await;
    let json = body_json(get(app.router, "/service/Seeded/metadata").await).await;

    assert_eq!(json["version"], "1.0");
    assert_eq!(json["description"], "");
    assert_eq!(json["input_parameters"][0]["required"], false);
}

#[tokio::test]
async fn unloaded_service_has_no_routes() {
    let app = build_test_app(StubBackend::new(0), 10).await;

    for uri in ["/service/Broken/health", "/service/Missing/metadata", "/service/_shared/health"] {
        let response = get(app.router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

#[tokio::test]
async fn echo_execute_completes_after_second_poll() {
    let stub = StubBackend::new(1);
    let app = build_test_app(stub, 10).await;

    let response = post_json(
        app.router.clone(),
        "/service/Echo/execute",
        json!([{ "node_id": "1", "text": "hi" }]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "completed");
    assert_eq!(json["images"], json!(["out.png"]));
    assert_eq!(json["prompt_id"], "abc");
    assert_eq!(json["artifacts"][0]["filename"], "out.png");
    assert_eq!(json["artifacts"][0]["path"], "out.png");
    assert_eq!(json["artifacts"][0]["size_bytes"], "bytes:out.png".len());

    assert_eq!(app.stub.polls(), 2);
    assert_eq!(app.stub.views(), 1);

    let submitted = app.stub.submitted().unwrap();
    assert_eq!(submitted["prompt"]["1"]["inputs"]["text"], "hi");
    assert_eq!(submitted["prompt"]["9"]["inputs"]["images"], json!(["1", 0]));

    let stored = std::fs::read(app.dir.path().join("outputs").join("out.png")).unwrap();
    assert_eq!(stored, b"bytes:out.png");
}

#[tokio::test]
async fn optional_parameter_is_coerced_and_bound() {
    let app = build_test_app(StubBackend::new(0), 10).await;

    let response = post_json(
        app.router.clone(),
        "/service/Seeded/execute",
        json!([{ "node_id": "3", "seed": "7" }]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let submitted = app.stub.submitted().unwrap();
    assert_eq!(submitted["prompt"]["3"]["inputs"], json!({ "seed": 7, "steps": 20 }));
}

#[tokio::test]
async fn omitted_optional_parameter_keeps_template_value() {
    let app = build_test_app(StubBackend::new(0), 10).await;

    let response = post_json(app.router.clone(), "/service/Seeded/execute", json!([])).await;

    assert_eq!(response.status(), StatusCode::OK);
    let submitted = app.stub.submitted().unwrap();
    assert_eq!(submitted["prompt"]["3"]["inputs"]["seed"], 42);
}

#[tokio::test]
async fn misaligned_input_is_rejected_before_submission() {
    let app = build_test_app(StubBackend::new(0), 10).await;

    let response = post_json(
        app.router.clone(),
        "/service/Echo/execute",
        json!([{ "node_id": "2", "text": "hi" }]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert!(app.stub.submitted().is_none());
}

#[tokio::test]
async fn wrong_type_is_rejected() {
    let app = build_test_app(StubBackend::new(0), 10).await;

    let response = post_json(
        app.router,
        "/service/Seeded/execute",
        json!([{ "node_id": "3", "seed": "abc" }]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("seed"));
}

#[tokio::test]
async fn non_array_body_is_bad_request() {
    let app = build_test_app(StubBackend::new(0), 10).await;

    let response = post_json(
        app.router.clone(),
        "/service/Echo/execute",
        json!({ "node_id": "1", "text": "hi" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(app.stub.submitted().is_none());
}

#[tokio::test]
async fn execute_requires_post() {
    let app = build_test_app(StubBackend::new(0), 10).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/service/Echo/execute")
        .body(Body::empty())
        .unwrap();
    let response = app.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn never_completing_job_is_gateway_timeout_without_fetch() {
    let app = build_test_app(StubBackend::new(usize::MAX), 3).await;

    let response = post_json(
        app.router.clone(),
        "/service/Echo/execute",
        json!([{ "node_id": "1", "text": "hi" }]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "TIMEOUT");
    assert_eq!(app.stub.polls(), 3);
    assert_eq!(app.stub.views(), 0);
}

#[tokio::test]
async fn shutdown_during_polling_is_service_unavailable() {
    let app = build_test_app(StubBackend::new(usize::MAX), 100_000).await;
    let trigger = app.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let response = post_json(
        app.router.clone(),
        "/service/Echo/execute",
        json!([{ "node_id": "1", "text": "hi" }]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
