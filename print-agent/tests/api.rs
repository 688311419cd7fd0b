//! HTTP surface, driven through the router without a socket

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{FakeSink, kot_job, network_printer};
use crab_printer::UsbSupport;
use http_body_util::BodyExt;
use print_agent::api::build_router;
use print_agent::printing::{JobStore, RedbJobStore};
use print_agent::core::{BackgroundTasks, TaskKind};
use print_agent::{Config, ServerState};
use serde_json::{Value, json};
use shared::models::{PaperFormat, PrinterRole};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<RedbJobStore>,
    sink: Arc<FakeSink>,
}

async fn app_with(sink: Arc<FakeSink>, interactive_timeout_ms: u64) -> TestApp {
    let store = Arc::new(RedbJobStore::open_in_memory().unwrap());
    store
        .save_printer(network_printer("Kitchen", PrinterRole::Kitchen, PaperFormat::Mm58))
        .await
        .unwrap();
    store
        .save_printer(network_printer("Counter", PrinterRole::Counter, PaperFormat::Mm80))
        .await
        .unwrap();

    let mut config = Config::with_overrides(std::env::temp_dir().to_string_lossy(), 0);
    config.agent_id = "agent-test".into();
    config.interactive_timeout_ms = interactive_timeout_ms;

    let state = ServerState::new(config, store.clone(), sink.clone(), UsbSupport::unavailable());
    TestApp {
        router: build_router(state),
        store,
        sink,
    }
}

async fn app() -> TestApp {
    app_with(FakeSink::new(), 2_000).await
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_identity_and_roles() {
    let app = app().await;
    let (status, body) = call(&app.router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["agent_id"], "agent-test");
    assert_eq!(body["printer_roles"], json!(["counter", "kitchen"]));
    assert_eq!(body["usb_available"], false);
    assert_eq!(body["push_enabled"], true);
}

#[tokio::test]
async fn health_degrades_when_a_worker_dies() {
    let store = Arc::new(RedbJobStore::open_in_memory().unwrap());
    let config = Config::with_overrides(std::env::temp_dir().to_string_lossy(), 0);
    let state = ServerState::new(config, store, FakeSink::new(), UsbSupport::unavailable());

    let mut tasks = BackgroundTasks::new(state.tasks.clone());
    tasks.spawn("print_dispatcher", TaskKind::Worker, async {
        panic!("dispatcher crashed");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let router = build_router(state);
    let (status, body) = call(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["stopped_workers"], json!(["print_dispatcher"]));
    tasks.shutdown().await;
}

#[tokio::test]
async fn enqueue_then_fetch_job() {
    let app = app().await;
    let job = kot_job("21");
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/jobs",
        Some(json!({
            "job_type": "kot",
            "printer_role": "kitchen",
            "payload": job.payload,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "E0000");
    assert_eq!(body["data"]["status"], "pending");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(&app.router, Method::GET, &format!("/jobs/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["job_type"], "kot");

    let (status, body) = call(&app.router, Method::GET, "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_payload_is_rejected_at_enqueue() {
    let app = app().await;
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/jobs",
        Some(json!({
            "job_type": "bill",
            "printer_role": "counter",
            "payload": {"billNumber": "7"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");
    assert!(app.store.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = app().await;
    let (status, body) = call(&app.router, Method::GET, "/jobs/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "E0003");
}

#[tokio::test]
async fn direct_print_bypasses_queue() {
    let app = app().await;
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/print",
        Some(json!({"job_type": "test", "printer_role": "counter"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["printer"], "Counter");
    assert_eq!(app.sink.send_count(), 1);
    assert!(app.sink.sent_text(0).contains("TEST PRINT"));
    assert!(app.store.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn direct_print_without_printer_is_unprocessable() {
    let app = app().await;
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/print",
        Some(json!({"job_type": "test", "printer_role": "bar"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "E0005");
    assert_eq!(app.sink.send_count(), 0);
}

#[tokio::test]
async fn direct_print_times_out() {
    let app = app_with(FakeSink::slow(Duration::from_millis(500)), 50).await;
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/print",
        Some(json!({"job_type": "test", "printer_role": "counter"})),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["code"], "E4002");
}

#[tokio::test]
async fn transport_failure_is_bad_gateway() {
    let app = app_with(FakeSink::failing("connection refused"), 2_000).await;
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/print",
        Some(json!({"job_type": "test", "printer_role": "kitchen"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "E4001");
}

#[tokio::test]
async fn raw_print_accepts_base64_and_text() {
    let app = app().await;

    // "\x1b@hi" in base64
    let (status, _) = call(
        &app.router,
        Method::POST,
        "/print/raw",
        Some(json!({"printer_role": "counter", "data": "G0BoaQ=="})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.sink.sent()[0].1, b"\x1b@hi");

    let (status, _) = call(
        &app.router,
        Method::POST,
        "/print/raw",
        Some(json!({"printer_role": "counter", "text": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.sink.sent_text(1).contains("Hello"));

    let (status, _) = call(
        &app.router,
        Method::POST,
        "/print/raw",
        Some(json!({"printer_role": "counter", "data": "not base64!"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.sink.send_count(), 2);
}

#[tokio::test]
async fn drawer_kick_goes_to_counter_by_default() {
    let app = app().await;
    let (status, _) = call(&app.router, Method::POST, "/drawer", Some(json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    let sent = app.sink.sent();
    assert_eq!(sent[0].0, "Counter");
    assert!(sent[0].1.ends_with(&[0x1B, 0x70, 0x00, 25, 250]));
}

#[tokio::test]
async fn drawer_kick_on_pin_five() {
    let app = app().await;
    let (status, _) = call(&app.router, Method::POST, "/drawer", Some(json!({"pin": 5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.sink.sent()[0].1.ends_with(&[0x1B, 0x70, 0x01, 25, 250]));

    let (status, body) = call(&app.router, Method::POST, "/drawer", Some(json!({"pin": 3}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");
    assert_eq!(app.sink.send_count(), 1);
}

#[tokio::test]
async fn resubmit_rejects_pending_jobs() {
    let app = app().await;
    let job = app.store.insert_job(kot_job("30")).await.unwrap();
    let (status, _) = call(
        &app.router,
        Method::POST,
        &format!("/jobs/{}/resubmit", job.id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn printer_crud() {
    let app = app().await;

    let (status, body) = call(
        &app.router,
        Method::POST,
        "/printers",
        Some(json!({
            "name": "Bar",
            "type": "network",
            "ipAddress": "192.168.1.77",
            "role": "bar",
            "format": "58mm",
            "isDefault": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, body) = call(&app.router, Method::GET, "/printers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, _) = call(&app.router, Method::DELETE, &format!("/printers/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app.router, Method::DELETE, "/printers/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "E0003");
}

#[tokio::test]
async fn incomplete_printer_is_rejected() {
    let app = app().await;
    let (status, body) = call(
        &app.router,
        Method::POST,
        "/printers",
        Some(json!({"name": "Broken", "type": "usb", "role": "counter"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");
}

#[tokio::test]
async fn usb_discovery_without_support_reports_failure() {
    let app = app().await;
    let (status, body) = call(&app.router, Method::GET, "/printers/discover/usb", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], false);
    assert_eq!(body["data"]["printers"], json!([]));
}

#[tokio::test]
async fn network_discovery_finds_listening_host() {
    let app = app().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let (status, body) = call(
        &app.router,
        Method::POST,
        "/printers/discover/network",
        Some(json!({"candidates": [format!("127.0.0.1:{}", port)], "timeout_ms": 500})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["ip"], "127.0.0.1");
    assert_eq!(body["data"][0]["port"], port);

    let (status, _) = call(&app.router, Method::POST, "/printers/discover/network", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
