use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::util::ServiceExt;

use crate::{offline_config, post_json, test_app};

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app(offline_config());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["healthy"], true);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_missing_or_unknown_action_is_rejected() {
    let (app, _) = test_app(offline_config());

    for path in ["/api/v1/missions", "/api/v1/daily-quiz", "/api/v1/daily-challenge"] {
        let (status, body) = post_json(&app, path, json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(body, json!({"error": "Invalid action"}));

        let (status, body) = post_json(&app, path, json!({"action": "explode"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(body["error"], "Invalid action");
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _) = test_app(offline_config());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/missions")
                .header("content-type", "application/json")
                .body(Body::from("{\"action\": "))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = test_app(offline_config());
    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v1/ocr")
                .header("origin", "http://localhost:8081")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_header_on_error_response() {
    let (app, _) = test_app(offline_config());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/ocr")
                .header("origin", "http://localhost:8081")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}
