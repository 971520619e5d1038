//! HTTP API tests.
//!
//! Drives the full router (correlation layer, extractors, handlers, error
//! mapping) against the in-memory store.
//!
//! Run with: `cargo test --test http_api_test`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use boxoffice::config::EngineConfig;
use boxoffice::engine::PurchaseEngine;
use boxoffice::server::{AppState, build_router};
use boxoffice_core::environment::Clock;
use boxoffice_core::types::Money;
use boxoffice_testing::{InMemoryTicketStore, ManualClock, ShowFixture, test_clock};
use chrono::Duration;
use serde_json::{Value, json};
use std::sync::Arc;

const SUBJECT: HeaderName = HeaderName::from_static("x-customer-subject");
const PROVIDER: HeaderName = HeaderName::from_static("x-customer-provider");
const IDEMPOTENCY_KEY: HeaderName = HeaderName::from_static("idempotency-key");
const CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

struct Api {
    server: TestServer,
    clock: Arc<ManualClock>,
}

async fn api() -> Api {
    let clock = Arc::new(ManualClock::starting_at(test_clock().now()));
    let store = Arc::new(InMemoryTicketStore::new());
    ShowFixture::new(1)
        .starting_in_hours(clock.now(), 2)
        .price(Money::from_cents(1250))
        .seats([1, 2, 3])
        .provision(&store)
        .await;
    ShowFixture::new(2)
        .starting_in_hours(clock.now(), 2)
        .inactive()
        .seats([1])
        .provision(&store)
        .await;

    let engine = Arc::new(PurchaseEngine::new(
        store,
        clock.clone(),
        EngineConfig::default(),
    ));
    let server = TestServer::new(build_router(AppState::new(engine))).expect("test server");
    Api { server, clock }
}

#[tokio::test]
async fn test_health_and_readiness() {
    let api = api().await;

    let health = api.server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.json::<Value>()["status"], "ok");

    let ready = api.server.get("/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>()["status"], "ready");
}

#[tokio::test]
async fn test_sale_returns_created_purchase() {
    let api = api().await;

    let response = api
        .server
        .post("/api/shows/1/sales")
        .json(&json!({"seat_ids": [2, 1], "payment_method": "card"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert!(response.headers().get(CORRELATION_ID).is_some());
    let body = response.json::<Value>();
    assert_eq!(body["state"], "PAID");
    assert_eq!(body["payment_method"], "CARD");
    assert_eq!(body["total"], "25.00");
    assert_eq!(body["total_cents"], 2500);
    assert_eq!(body["replayed"], false);
    assert_eq!(body["tickets"][0]["seat_id"], 1);
    assert_eq!(body["tickets"][1]["seat_id"], 2);
    assert_eq!(body["tickets"][0]["state"], "ISSUED");
    assert!(body["tickets"][0]["code"].is_string());
}

#[tokio::test]
async fn test_replayed_sale_returns_ok_with_same_purchase() {
    let api = api().await;
    let key = HeaderValue::from_static("abc");

    let first = api
        .server
        .post("/api/shows/1/sales")
        .add_header(IDEMPOTENCY_KEY, key.clone())
        .json(&json!({"seat_ids": [3], "payment_method": "CASH"}))
        .await;
    let second = api
        .server
        .post("/api/shows/1/sales")
        .add_header(IDEMPOTENCY_KEY, key)
        .json(&json!({"seat_ids": [3], "payment_method": "CASH"}))
        .await;

    assert_eq!(first.status_code(), StatusCode::CREATED);
    assert_eq!(second.status_code(), StatusCode::OK);
    let (first, second) = (first.json::<Value>(), second.json::<Value>());
    assert_eq!(first["id"], second["id"]);
    assert_eq!(first["tickets"], second["tickets"]);
    assert_eq!(second["replayed"], true);
    assert_eq!(second["idempotency_key"], "abc");
}

#[tokio::test]
async fn test_body_idempotency_key_is_honoured() {
    let api = api().await;
    let body = json!({"seat_ids": [1], "payment_method": "CASH", "idempotency_key": "from-body"});

    let first = api.server.post("/api/shows/1/sales").json(&body).await;
    let second = api.server.post("/api/shows/1/sales").json(&body).await;

    assert_eq!(first.status_code(), StatusCode::CREATED);
    assert_eq!(second.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_conflict_maps_to_409() {
    let api = api().await;
    api.server
        .post("/api/shows/1/sales")
        .json(&json!({"seat_ids": [2], "payment_method": "CASH"}))
        .await;

    let response = api
        .server
        .post("/api/shows/1/sales")
        .json(&json!({"seat_ids": [1, 2, 3], "payment_method": "CASH"}))
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "SEAT_CONFLICT");

    let seats = api.server.get("/api/shows/1/seats").await.json::<Value>();
    assert_eq!(seats["counts"]["available"], 2);
    assert_eq!(seats["counts"]["sold"], 1);
}

#[tokio::test]
async fn test_validation_failures_map_to_400() {
    let api = api().await;

    let bad_method = api
        .server
        .post("/api/shows/1/sales")
        .json(&json!({"seat_ids": [1], "payment_method": "BITCOIN"}))
        .await;
    assert_eq!(bad_method.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(bad_method.json::<Value>()["code"], "VALIDATION_ERROR");

    let missing_method = api
        .server
        .post("/api/shows/1/sales")
        .json(&json!({"seat_ids": [1]}))
        .await;
    assert_eq!(missing_method.status_code(), StatusCode::BAD_REQUEST);

    let empty = api
        .server
        .post("/api/shows/1/sales")
        .json(&json!({"seat_ids": [], "payment_method": "CASH"}))
        .await;
    assert_eq!(empty.status_code(), StatusCode::BAD_REQUEST);

    let repeated = api
        .server
        .post("/api/shows/1/sales")
        .json(&json!({"seat_ids": [1, 1], "payment_method": "CASH"}))
        .await;
    assert_eq!(repeated.status_code(), StatusCode::BAD_REQUEST);

    let malformed = api
        .server
        .post("/api/shows/1/sales")
        .json(&json!({"seat_ids": "one", "payment_method": "CASH"}))
        .await;
    assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(malformed.json::<Value>()["code"], "BAD_REQUEST");

    let inactive = api
        .server
        .post("/api/shows/2/sales")
        .json(&json!({"seat_ids": [1], "payment_method": "CASH"}))
        .await;
    assert_eq!(inactive.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_resources_map_to_404() {
    let api = api().await;

    let show = api.server.get("/api/shows/99/seats").await;
    assert_eq!(show.status_code(), StatusCode::NOT_FOUND);

    let purchase = api
        .server
        .get("/api/purchases/7d5f3a4e-9a0b-4a9e-b1f1-0c2d3e4f5a6b")
        .await;
    assert_eq!(purchase.status_code(), StatusCode::NOT_FOUND);

    let release = api.server.post("/api/shows/99/holds/release-expired").await;
    assert_eq!(release.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reservation_requires_customer_headers() {
    let api = api().await;

    let response = api
        .server
        .post("/api/shows/1/reservations")
        .json(&json!({"seat_ids": [1]}))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_reservation_then_box_office_confirmation() {
    let api = api().await;

    let reserved = api
        .server
        .post("/api/shows/1/reservations")
        .add_header(SUBJECT, HeaderValue::from_static("user-42"))
        .add_header(PROVIDER, HeaderValue::from_static("google"))
        .json(&json!({"seat_ids": [1, 2]}))
        .await;
    assert_eq!(reserved.status_code(), StatusCode::CREATED);
    let reserved = reserved.json::<Value>();
    assert_eq!(reserved["state"], "PENDING");
    assert_eq!(reserved["tickets"][0]["state"], "HELD");
    assert!(reserved["tickets"][0]["code"].is_null());

    let seats = api.server.get("/api/shows/1/seats").await.json::<Value>();
    assert_eq!(seats["counts"]["held"], 2);
    assert!(seats["seats"][0]["hold_expiry"].is_string());

    api.clock.advance(Duration::minutes(30));
    let confirmed = api
        .server
        .post("/api/shows/1/box-office/sales")
        .json(&json!({"seat_ids": [1, 2, 3], "payment_method": "paypal"}))
        .await;
    assert_eq!(confirmed.status_code(), StatusCode::OK);
    let confirmed = confirmed.json::<Value>();
    assert_eq!(confirmed["confirmed_from_hold"], 2);
    assert_eq!(confirmed["newly_sold"], 1);
    assert!(confirmed["new_purchase_id"].is_string());
    assert_eq!(confirmed["settled_purchase_ids"][0], reserved["id"]);

    let id = reserved["id"].as_str().unwrap();
    let purchase = api
        .server
        .get(&format!("/api/purchases/{id}"))
        .await
        .json::<Value>();
    assert_eq!(purchase["state"], "PAID");
    assert_eq!(purchase["payment_method"], "PAYPAL");
    assert_eq!(purchase["tickets"][1]["state"], "ISSUED");
}

#[tokio::test]
async fn test_expired_holds_are_released_over_http() {
    let api = api().await;
    api.server
        .post("/api/shows/1/reservations")
        .add_header(SUBJECT, HeaderValue::from_static("user-7"))
        .json(&json!({"seat_ids": [3]}))
        .await;

    api.clock.advance(Duration::minutes(61));
    let seats = api.server.get("/api/shows/1/seats").await.json::<Value>();
    assert_eq!(seats["counts"]["available"], 3);

    let released = api.server.post("/api/shows/1/holds/release-expired").await;
    assert_eq!(released.status_code(), StatusCode::OK);
    assert_eq!(released.json::<Value>()["released_count"], 1);

    let again = api.server.post("/api/shows/1/holds/release-expired").await;
    assert_eq!(again.json::<Value>()["released_count"], 0);
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let api = api().await;
    let id = "0f8fad5b-d9cb-469f-a165-70867728950e";

    let response = api
        .server
        .get("/health")
        .add_header(CORRELATION_ID, HeaderValue::from_static(id))
        .await;

    assert_eq!(
        response.headers().get(CORRELATION_ID).and_then(|v| v.to_str().ok()),
        Some(id)
    );
}

#[tokio::test]
async fn test_malformed_path_ids_use_the_error_format() {
    let api = api().await;

    let show = api.server.get("/api/shows/abc/seats").await;
    assert_eq!(show.status_code(), StatusCode::BAD_REQUEST);
    let body = show.json::<Value>();
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["message"].is_string());

    let sale = api
        .server
        .post("/api/shows/one/sales")
        .json(&json!({"seat_ids": [1], "payment_method": "CASH"}))
        .await;
    assert_eq!(sale.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(sale.json::<Value>()["code"], "BAD_REQUEST");

    let purchase = api.server.get("/api/purchases/not-a-uuid").await;
    assert_eq!(purchase.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(purchase.json::<Value>()["code"], "BAD_REQUEST");
}
