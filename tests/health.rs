//! Integration tests for /health endpoint

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use metricslab::{
    config::Config,
    handlers::{self, AppState},
};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let state = AppState::new(Arc::new(Config::default())).unwrap();
    let app = handlers::router(state);

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

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "OK");
    assert_eq!(json["series"], 1);
    assert_eq!(json["identity_rejections"], 0);
}

#[tokio::test]
async fn test_health_endpoint_not_found() {
    let state = AppState::new(Arc::new(Config::default())).unwrap();
    let app = handlers::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
