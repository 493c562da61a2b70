//! Router-level checks of the intake HTTP surface

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use intake_types::ids::IdempotencyKey;
use intake_types::order::{OrderStatus, PendingOrder, Side};
use order_intake::config::{BuildInfo, Config};
use order_intake::ledger::{InMemoryLedger, OrderLedger};
use order_intake::observability::detached_handle;
use order_intake::publisher::InMemoryPublisher;
use order_intake::{AppState, create_router};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    router: axum::Router,
    ledger: Arc<InMemoryLedger>,
    publisher: Arc<InMemoryPublisher>,
}

fn test_app(config: Config) -> TestApp {
    let ledger = Arc::new(InMemoryLedger::new());
    let publisher = Arc::new(InMemoryPublisher::new("orders.in"));
    let state = AppState::from_parts(&config, ledger.clone(), publisher.clone(), detached_handle());
    TestApp {
        router: create_router(state),
        ledger,
        publisher,
    }
}

fn default_app() -> TestApp {
    test_app(Config::default())
}

fn order_request(body: Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/trade/orders")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header("Idempotency-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn btc_buy() -> Value {
    json!({"symbol": "BTCUSDT", "side": "buy", "price": 50000, "qty": 0.1})
}

#[tokio::test]
async fn test_create_order_accepted() {
    let app = default_app();
    let (status, headers, body) = send(&app.router, order_request(btc_buy(), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    let order_id = body["order_id"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(order_id).is_ok());
    assert!(headers.get("idempotent-replayed").is_none());

    assert_eq!(app.ledger.insert_calls(), 1);
    assert_eq!(app.publisher.publish_calls(), 1);
}

#[tokio::test]
async fn test_replay_returns_same_body_with_header() {
    let app = default_app();
    let (_, _, first) = send(&app.router, order_request(btc_buy(), Some("abc"))).await;
    let (status, headers, second) = send(&app.router, order_request(btc_buy(), Some("abc"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(headers.get("idempotent-replayed").unwrap(), "true");
    assert_eq!(app.ledger.insert_calls(), 1);
    assert_eq!(app.publisher.publish_calls(), 1);
}

#[tokio::test]
async fn test_validation_errors_are_bad_request() {
    let app = default_app();
    let cases = [
        json!({"symbol": "", "side": "buy", "price": 1, "qty": 1}),
        json!({"symbol": "ETHUSDT", "side": "hold", "price": 1, "qty": 1}),
        json!({"symbol": "ETHUSDT", "side": "sell", "price": 0, "qty": 1}),
        json!({"symbol": "ETHUSDT", "side": "sell", "price": 1, "quantity": -1}),
        json!({}),
    ];
    for case in cases {
        let (status, _, body) = send(&app.router, order_request(case, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_request");
        assert!(body["message"].as_str().is_some());
    }
    assert_eq!(app.ledger.insert_calls(), 0);
    assert_eq!(app.publisher.publish_calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = default_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/trade/orders")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"symbol\": \"BTCUSDT\","))
        .unwrap();
    let (status, _, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let wrong_type = order_request(json!({"symbol": "BTCUSDT", "side": "buy", "price": "abc", "qty": 1}), None);
    let (status, _, body) = send(&app.router, wrong_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(app.ledger.insert_calls(), 0);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let app = default_app();
    let padding = "x".repeat(2 * 1024 * 1024);
    let body = json!({"symbol": padding, "side": "buy", "price": 1, "qty": 1});
    let (status, _, body) = send(&app.router, order_request(body, None)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "payload_too_large");
    assert_eq!(app.ledger.insert_calls(), 0);
}

#[tokio::test]
async fn test_oversized_idempotency_key_rejected() {
    let app = default_app();
    let key = "k".repeat(300);
    let (status, _, body) = send(&app.router, order_request(btc_buy(), Some(&key))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(app.ledger.insert_calls(), 0);
}

#[tokio::test]
async fn test_ledger_down_is_service_unavailable() {
    let app = default_app();
    app.ledger.set_fail_inserts(true);
    let (status, _, body) = send(&app.router, order_request(btc_buy(), None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "store_unavailable");
    assert_eq!(app.publisher.publish_calls(), 0);
}

#[tokio::test]
async fn test_publish_failure_is_service_unavailable_and_compensated() {
    let app = default_app();
    app.publisher.set_fail_publish(true);
    let (status, _, body) = send(&app.router, order_request(btc_buy(), Some("k-pub"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "queue_unavailable");

    let records = app.ledger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, OrderStatus::Failed);
}

#[tokio::test]
async fn test_key_held_by_unfinished_order_is_conflict() {
    let app = default_app();
    let existing = PendingOrder::new(
        "BTCUSDT",
        Side::Buy,
        Decimal::ONE,
        Decimal::ONE,
        IdempotencyKey::parse("held").unwrap(),
    );
    app.ledger.insert_pending(&existing).await.unwrap();

    let (status, headers, body) = send(&app.router, order_request(btc_buy(), Some("held"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "request_in_progress");
    assert!(headers.get("idempotent-replayed").is_none());
    assert_eq!(app.publisher.publish_calls(), 0);
}

#[tokio::test]
async fn test_slow_ledger_times_out_but_completes() {
    let app = test_app(Config {
        request_timeout: Duration::from_millis(50),
        ..Config::default()
    });
    app.ledger.set_insert_delay(Duration::from_millis(300));

    let (status, _, body) = send(&app.router, order_request(btc_buy(), Some("slow"))).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"], "timeout");

    // The detached intake finishes on its own
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(app.ledger.len(), 1);
    assert_eq!(app.publisher.published().len(), 1);

    // A retry with the same key now sees the finished order
    app.ledger.set_insert_delay(Duration::ZERO);
    let (status, headers, body) = send(&app.router, order_request(btc_buy(), Some("slow"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("idempotent-replayed").unwrap(), "true");
    assert_eq!(body["order_id"], app.publisher.published()[0].1.order_id.to_string());
}

#[tokio::test]
async fn test_request_id_generated_and_echoed() {
    let app = default_app();

    let request = Request::builder()
        .uri("/healthz")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app.router, request).await;
    assert_eq!(headers.get("x-request-id").unwrap(), "req-123");

    let (_, headers, _) = send(&app.router, order_request(btc_buy(), None)).await;
    let generated = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert!(!generated.is_empty());
}

#[tokio::test]
async fn test_healthz_touches_no_dependency() {
    let app = default_app();
    app.ledger.set_reachable(false);
    app.publisher.set_reachable(false);

    let response = app.router.clone().oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_readyz_reports_each_dependency() {
    let app = test_app(Config {
        build: BuildInfo {
            env: "staging".to_string(),
            ..BuildInfo::default()
        },
        ..Config::default()
    });

    let (status, _, body) = send(&app.router, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"ready": true, "ledger": true, "publisher": true, "env": "staging", "status": "ready"})
    );

    app.publisher.set_reachable(false);
    let (status, _, body) = send(&app.router, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
    assert_eq!(body["ledger"], true);
    assert_eq!(body["publisher"], false);
    assert_eq!(body["status"], "not-ready");
}

#[tokio::test]
async fn test_version_reports_build_info() {
    let app = test_app(Config {
        build: BuildInfo {
            env: "prod".to_string(),
            version: "1.4.2".to_string(),
            git_sha: "abc1234".to_string(),
            build_ts: "2026-01-01T00:00:00Z".to_string(),
        },
        ..Config::default()
    });
    let (status, _, body) = send(&app.router, get("/__version")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"version": "1.4.2", "git_sha": "abc1234", "build_ts": "2026-01-01T00:00:00Z"})
    );
}

#[tokio::test]
async fn test_metrics_endpoint_serves_text() {
    let app = default_app();
    let response = app.router.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = default_app();
    let response = app.router.clone().oneshot(get("/api/v1/trade/unknown")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
