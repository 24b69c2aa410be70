//! `/api/logs`, `/api/data` and `/` behaviour.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use axum::Router;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use beacon_core::log::{LogSink, MemorySink};
use beacon_core::metrics::{
    BUSINESS_OPERATIONS_TOTAL, DATA_PROCESSING_DURATION_SECONDS, HTTP_REQUESTS_TOTAL,
};
use beacon_core::{Registry, StructuredLogger};
use beacon_server::app_state::{AppState, SERVICE_VERSION};
use beacon_server::config::ServiceConfig;
use beacon_server::handlers::{DataHandler, LogsHandler};
use beacon_server::middleware::instrumented;
use beacon_server::router::build_router_with;

fn state() -> (AppState, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let logger = StructuredLogger::new("beacon-test", sink.clone() as Arc<dyn LogSink>);
    let registry = Arc::new(Registry::standard().unwrap());
    (AppState::new(ServiceConfig::default(), registry, logger), sink)
}

fn app_with_failure_rate(state: &AppState, rate: f64) -> Router {
    let data = DataHandler::new(state.registry(), state.logger().clone())
        .with_failure_rate(rate)
        .with_delay_ms(0..=0);
    let logs = LogsHandler::new(state.registry(), state.logger().clone());
    build_router_with(state.clone(), data, logs)
}

fn business(state: &AppState, op: &str, status: &str) -> Option<u64> {
    state
        .registry()
        .counter(BUSINESS_OPERATIONS_TOTAL)
        .unwrap()
        .get(&[op, status])
}

fn requests(state: &AppState, labels: &[&str]) -> Option<u64> {
    state.registry().counter(HTTP_REQUESTS_TOTAL).unwrap().get(labels)
}

fn post_logs(body: &str) -> Request {
    Request::builder()
        .method(Method::POST)
        .uri("/api/logs")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, req: Request) -> (StatusCode, Vec<u8>) {
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn warn_trigger_logs_and_counts() {
    let (state, sink) = state();
    let app = app_with_failure_rate(&state, 0.0);

    let (status, body) = send(
        app,
        post_logs(r#"{"level":"warn","message":"disk almost full","fields":{"disk":"/var","pct":91}}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({ "status": "logged", "level": "warn" }));

    assert_eq!(business(&state, "log_trigger", "warn"), Some(1));
    assert_eq!(business(&state, "log_trigger", "success"), Some(1));
    assert_eq!(business(&state, "log_trigger", "error"), None);
    assert_eq!(requests(&state, &["POST", "/api/logs", "200"]), Some(1));

    let rec = sink.find("disk almost full");
    assert_eq!(rec.len(), 1);
    assert_eq!(rec[0]["level"], "WARN");
    assert_eq!(rec[0]["disk"], "/var");
    assert_eq!(rec[0]["pct"], 91);
    assert_eq!(rec[0]["service"], "beacon-test");
}

#[tokio::test]
async fn error_trigger_counts_error_and_success() {
    let (state, sink) = state();
    let (status, _) = send(
        app_with_failure_rate(&state, 0.0),
        post_logs(r#"{"level":"error","message":"payment failed"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(business(&state, "log_trigger", "error"), Some(1));
    assert_eq!(business(&state, "log_trigger", "success"), Some(1));
    assert_eq!(sink.find("payment failed")[0]["level"], "ERROR");
}

#[tokio::test]
async fn info_and_unknown_levels_log_at_info() {
    let (state, sink) = state();
    let app = app_with_failure_rate(&state, 0.0);

    send(app.clone(), post_logs(r#"{"message":"plain"}"#)).await;
    let (status, body) = send(app, post_logs(r#"{"level":"shout","message":"loud"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["level"], "shout");

    assert_eq!(sink.find("plain")[0]["level"], "INFO");
    assert_eq!(sink.find("loud")[0]["level"], "INFO");
    assert_eq!(business(&state, "log_trigger", "success"), Some(2));
    assert_eq!(business(&state, "log_trigger", "warn"), None);
}

#[tokio::test]
async fn malformed_body_is_400_without_business_counter() {
    let (state, sink) = state();
    let (status, body) = send(app_with_failure_rate(&state, 0.0), post_logs("{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({ "error": "invalid request body" }));

    assert_eq!(business(&state, "log_trigger", "success"), None);
    assert_eq!(requests(&state, &["POST", "/api/logs", "400"]), Some(1));

    let invalid = sink.find("invalid_request");
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0]["level"], "ERROR");
    assert!(invalid[0]["error"].as_str().is_some());
}

#[tokio::test]
async fn non_post_on_logs_is_405_with_empty_body() {
    let (state, _sink) = state();
    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/logs")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app_with_failure_rate(&state, 0.0), req).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert!(body.is_empty());
    assert_eq!(business(&state, "log_trigger", "success"), None);
    assert_eq!(requests(&state, &["GET", "/api/logs", "405"]), Some(1));
}

#[tokio::test]
async fn data_success_returns_record_and_observes_processing() {
    let (state, sink) = state();
    let req = Request::builder().uri("/api/data").body(Body::empty()).unwrap();
    let (status, body) = send(app_with_failure_rate(&state, 0.0), req).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "processed");
    let id = json["id"].as_u64().unwrap();
    assert!((1..=10_000).contains(&id));
    assert!(json["value"].is_number());
    assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    assert_eq!(json["processing_time_ms"], 0);

    assert_eq!(business(&state, "data_fetch", "success"), Some(1));
    let registry = state.registry();
    let hist = registry.histogram(DATA_PROCESSING_DURATION_SECONDS).unwrap();
    assert_eq!(hist.count(&[]), Some(1));

    let processed = sink.find("data_processed");
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0]["record_id"], id);
}

#[tokio::test]
async fn data_failure_is_500_and_counted() {
    let (state, sink) = state();
    let req = Request::builder().uri("/api/data").body(Body::empty()).unwrap();
    let (status, body) = send(app_with_failure_rate(&state, 1.0), req).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({ "error": "data processing failed" }));

    assert_eq!(business(&state, "data_fetch", "failure"), Some(1));
    assert_eq!(business(&state, "data_fetch", "success"), None);
    assert_eq!(requests(&state, &["GET", "/api/data", "500"]), Some(1));

    let registry = state.registry();
    let hist = registry.histogram(DATA_PROCESSING_DURATION_SECONDS).unwrap();
    assert_eq!(hist.count(&[]), Some(0));

    let failed = sink.find("data_fetch_failed");
    assert_eq!(failed[0]["level"], "ERROR");
    assert_eq!(failed[0]["reason"], "simulated_error");
}

#[tokio::test]
async fn health_reports_service_and_version() {
    let (state, _sink) = state();
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, body) = send(app_with_failure_rate(&state, 0.0), req).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "beacon");
    assert_eq!(json["version"], SERVICE_VERSION);
    assert!(json["time"].is_string());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (state, sink) = state();
    let big = format!(r#"{{"message":"{}"}}"#, "x".repeat(1024 * 1024 + 1));
    let (status, _) = send(app_with_failure_rate(&state, 0.0), post_logs(&big)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(business(&state, "log_trigger", "success"), None);
    assert_eq!(sink.find("invalid_request").len(), 1);
}

#[tokio::test]
async fn null_members_take_defaults() {
    let (state, sink) = state();
    let app = app_with_failure_rate(&state, 0.0);

    let (status, body) = send(
        app.clone(),
        post_logs(r#"{"level":"info","message":"m","fields":null}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["level"], "info");

    let (status, body) = send(app, post_logs(r#"{"level":null,"message":"n"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["level"], "info");

    assert_eq!(sink.find("m")[0]["level"], "INFO");
    assert_eq!(sink.find("n")[0]["level"], "INFO");
    assert!(sink.find("invalid_request").is_empty());
    assert_eq!(business(&state, "log_trigger", "success"), Some(2));
}

#[tokio::test]
async fn level_names_are_case_sensitive() {
    let (state, sink) = state();
    let app = app_with_failure_rate(&state, 0.0);

    for level in ["WARN", "Warning", "ERROR"] {
        let body = format!(r#"{{"level":"{level}","message":"{level}"}}"#);
        let (status, _) = send(app.clone(), post_logs(&body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sink.find(level)[0]["level"], "INFO");
    }

    assert_eq!(business(&state, "log_trigger", "warn"), None);
    assert_eq!(business(&state, "log_trigger", "error"), None);
    assert_eq!(business(&state, "log_trigger", "success"), Some(3));
}

#[tokio::test]
async fn body_that_never_finishes_is_rejected_after_read_budget() {
    let (state, sink) = state();
    let logs = LogsHandler::new(state.registry(), state.logger().clone())
        .with_read_timeout(Duration::from_millis(50));
    let app: Router = Router::new().route("/api/logs", instrumented(state.instrumentation(), logs));

    let first = Ok::<_, std::io::Error>(bytes::Bytes::from_static(b"{\"level\""));
    let stalled = futures_util::stream::iter([first]).chain(futures_util::stream::pending());
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/logs")
        .body(Body::from_stream(stalled))
        .unwrap();

    let (status, body) = tokio::time::timeout(Duration::from_secs(5), send(app, req))
        .await
        .expect("body read was not bounded");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, json!({ "error": "invalid request body" }));

    assert_eq!(sink.find("invalid_request").len(), 1);
    assert_eq!(business(&state, "log_trigger", "success"), None);
    assert_eq!(requests(&state, &["POST", "/api/logs", "400"]), Some(1));
}
