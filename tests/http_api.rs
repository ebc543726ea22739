mod support;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use coinrank::config::AllowedOrigins;
use coinrank::infra::http::{HttpState, build_router};
use coinrank_api_types::{BitcoinResponse, CacheStatsResponse, DeleteBitcoinResponse};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use support::{Harness, harness};

fn router(h: &Harness) -> Router {
    build_router(
        HttpState::new(Arc::new(h.service.clone())),
        &AllowedOrigins::Any,
    )
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response = send_raw(app, method, uri, body).await;
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be json")
    };
    (status, value)
}

async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> axum::response::Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    app.clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

#[tokio::test]
async fn health_reports_healthy() {
    let h = harness();
    let (status, body) = send(&router(&h), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn readiness_turns_unavailable_with_the_cache() {
    let h = harness();
    let app = router(&h);

    let response = send_raw(&app, Method::GET, "/health/ready", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    h.cache.fail_reads(true);
    let response = send_raw(&app, Method::GET, "/health/ready", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn create_then_fetch_round_trip() {
    let h = harness();
    let app = router(&h);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/bitcoins",
        Some(json!({"symbol": "BTC", "price": 65000})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created: BitcoinResponse = serde_json::from_value(body).expect("record body");
    assert_eq!(created.symbol, "BTC");
    assert_eq!(created.price, 65_000);
    assert!(created.rank.is_none());

    let response = send_raw(&app, Method::GET, "/api/bitcoins/BTC", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-cache").map(|v| v.as_bytes()),
        Some(&b"HIT"[..])
    );
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn create_rejects_missing_fields() {
    let h = harness();
    let app = router(&h);

    for payload in [
        json!({"price": 1}),
        json!({"symbol": "", "price": 1}),
        json!({"symbol": "BTC"}),
        json!({"symbol": "BTC", "price": "cheap"}),
    ] {
        let (status, body) = send(&app, Method::POST, "/api/bitcoins", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
        assert_eq!(body["error"]["message"], "Symbol and price are required");
    }
    assert_eq!(h.repo.len(), 0);
}

#[tokio::test]
async fn update_sets_the_price_of_the_path_symbol() {
    let h = harness();
    let app = router(&h);
    h.service.set_bitcoin("ETH", 3_500).await.expect("seed");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/bitcoins/ETH",
        Some(json!({"price": 3600})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "ETH");
    assert_eq!(body["price"], 3600);

    let (status, body) = send(&app, Method::PUT, "/api/bitcoins/ETH", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Price is required");
}

#[tokio::test]
async fn listing_is_ranked() {
    let h = harness();
    let app = router(&h);
    for (symbol, price) in [("BNB", 450), ("BTC", 65_000), ("ETH", 3_500)] {
        h.service.set_bitcoin(symbol, price).await.expect("seed");
    }

    let (status, body) = send(&app, Method::GET, "/api/bitcoins", None).await;
    assert_eq!(status, StatusCode::OK);
    let listing: Vec<BitcoinResponse> = serde_json::from_value(body).expect("listing body");
    let ranked: Vec<(String, Option<i64>)> = listing
        .into_iter()
        .map(|record| (record.symbol, record.rank))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("BTC".to_string(), Some(1)),
            ("ETH".to_string(), Some(2)),
            ("BNB".to_string(), Some(3)),
        ]
    );
}

#[tokio::test]
async fn delete_returns_the_removed_record() {
    let h = harness();
    let app = router(&h);
    h.service.set_bitcoin("BTC", 65_000).await.expect("seed");

    let (status, body) = send(&app, Method::DELETE, "/api/bitcoins/BTC", None).await;
    assert_eq!(status, StatusCode::OK);
    let deleted: DeleteBitcoinResponse = serde_json::from_value(body).expect("delete body");
    assert_eq!(deleted.message, "Bitcoin deleted successfully");
    assert_eq!(deleted.bitcoin.symbol, "BTC");

    let (status, body) = send(&app, Method::DELETE, "/api/bitcoins/BTC", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = send(&app, Method::GET, "/api/bitcoins/BTC", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_failures_become_internal_errors_without_detail() {
    let h = harness();
    let app = router(&h);
    h.repo.fail(true);

    let (status, body) = send(&app, Method::GET, "/api/bitcoins", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "repo_error");
    assert!(body["error"].get("hint").is_none());
}

#[tokio::test]
async fn cache_failures_do_not_change_status_codes() {
    let h = harness();
    let app = router(&h);
    h.cache.fail_all(true);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/bitcoins",
        Some(json!({"symbol": "BTC", "price": 65000})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = send_raw(&app, Method::GET, "/api/bitcoins/BTC", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-cache").map(|v| v.as_bytes()),
        Some(&b"MISS"[..])
    );
}

#[tokio::test]
async fn cache_stats_expose_backend_info() {
    let h = harness();
    let app = router(&h);
    h.cache
        .inner
        .insert_raw("bitcoin:BTC", "{}", Duration::from_secs(60));

    let (status, body) = send(&app, Method::GET, "/api/cache/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    let stats: CacheStatsResponse = serde_json::from_value(body).expect("stats body");
    assert!(stats.info.contains("keys:1"), "unexpected info: {}", stats.info);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let h = harness();
    let app = router(&h);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/bitcoins")
        .header(header::ORIGIN, "https://prices.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .expect("request should build");
    let response = app.oneshot(request).await.expect("router should respond");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|v| v.as_bytes()),
        Some(&b"*"[..])
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_MAX_AGE)
            .map(|v| v.as_bytes()),
        Some(&b"43200"[..])
    );
}

#[tokio::test]
async fn caller_request_id_is_echoed_and_oversized_ids_are_replaced() {
    let h = harness();
    let app = router(&h);

    let request = |id: String| {
        Request::builder()
            .uri("/health")
            .header("x-request-id", id)
            .body(Body::empty())
            .expect("request should build")
    };

    let response = app
        .clone()
        .oneshot(request("trace-42".to_string()))
        .await
        .expect("router should respond");
    assert_eq!(
        response.headers().get("x-request-id").map(|v| v.as_bytes()),
        Some(&b"trace-42"[..])
    );

    let oversized = "x".repeat(200);
    let response = app
        .clone()
        .oneshot(request(oversized.clone()))
        .await
        .expect("router should respond");
    let echoed = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("request id header");
    assert_ne!(echoed, oversized);
    assert_eq!(echoed.len(), 36);
}
