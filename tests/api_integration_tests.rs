//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use peercache::{api::create_router, cache::BoundedCache, AppState};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_app_with(100, Duration::ZERO)
}

fn create_app_with(capacity: usize, ttl: Duration) -> Router {
    let cache = BoundedCache::new("integration", capacity, ttl);
    let state = AppState::new(cache);
    create_router(state)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(put_json("/set", r#"{"key":"test_key","value":"test_value"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json.get("message").is_some());
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_rejects_empty_key() {
    let app = create_test_app();

    let response = app
        .oneshot(put_json("/set", r#"{"key":"","value":"test_value"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

// == SET-MANY Endpoint Tests ==

#[tokio::test]
async fn test_set_many_endpoint_success() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(put_json(
            "/set-many",
            r#"{"entries":{"a":"1","b":"2","c":"3"}}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["count"], 3);

    // Every pair landed
    for key in ["a", "b", "c"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/get/{key}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_set_many_endpoint_rejects_batch_with_blank_key() {
    let app = create_test_app();

    let response = app
        .clone()
        .oneshot(put_json("/set-many", r#"{"entries":{"a":"1","":"2"}}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // All-or-nothing: the valid pair was not applied either
    let response = app
        .oneshot(
            Request::builder()
                .uri("/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["size"], 0);
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_returns_value() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"hello","value":"world"}"#))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/get/hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "hello");
    assert_eq!(json["value"], "world");
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/get/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response.into_body()).await;
    assert!(json.get("error").is_some());
}

#[tokio::test]
async fn test_get_endpoint_expired_key_is_not_found() {
    let app = create_app_with(100, Duration::from_millis(30));

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"fleeting","value":"v"}"#))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/get/fleeting")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"doomed","value":"v"}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/del/doomed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/get/doomed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_not_found() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/del/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == CLEAR Endpoint Tests ==

#[tokio::test]
async fn test_clear_endpoint_empties_cache() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set-many", r#"{"entries":{"a":"1","b":"2"}}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/clear")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["size"], 0);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint_reports_management_view() {
    let app = create_test_app();

    app.clone()
        .oneshot(put_json("/set", r#"{"key":"k","value":"v"}"#))
        .await
        .unwrap();

    // One hit, one miss
    app.clone()
        .oneshot(Request::builder().uri("/get/k").body(Body::empty()).unwrap())
        .await
        .unwrap();
    app.clone()
        .oneshot(
            Request::builder()
                .uri("/get/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["name"], "integration");
    assert_eq!(json["size"], 1);
    assert_eq!(json["capacity"], 100);
    assert_eq!(json["time_to_live_secs"], 0);
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}

// == Eviction Behavior Through The API ==

#[tokio::test]
async fn test_capacity_eviction_through_api() {
    let app = create_app_with(2, Duration::ZERO);

    for (key, value) in [("a", "1"), ("b", "2"), ("c", "3")] {
        app.clone()
            .oneshot(put_json(
                "/set",
                &format!(r#"{{"key":"{key}","value":"{value}"}}"#),
            ))
            .await
            .unwrap();
    }

    // Oldest insertion was evicted; the rest survive
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/get/a").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    for key in ["b", "c"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/get/{key}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
