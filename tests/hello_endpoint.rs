//! End-to-end tests for /hello and its counter

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use metricslab::{
    config::Config,
    handlers::{self, AppState},
    registry::Tags,
};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

fn create_app() -> (Router, AppState) {
    let state = AppState::new(Arc::new(Config::default())).expect("should create state");
    (handlers::router(state.clone()), state)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_hello_returns_greeting() {
    let (app, _) = create_app();
    let (status, body) = get(&app, "/hello").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Hello, metrics!");
}

#[tokio::test]
async fn test_five_hellos_show_up_in_snapshot() {
    let (app, state) = create_app();

    for _ in 0..5 {
        let (status, _) = get(&app, "/hello").await;
        assert_eq!(status, StatusCode::OK);
    }

    let hello: Vec<_> = state
        .registry()
        .snapshot()
        .into_iter()
        .filter(|s| s.name == "app.hello.requests")
        .collect();

    assert_eq!(hello.len(), 1, "exactly one hello series expected");
    assert_eq!(
        hello[0].tags,
        Tags::from_pairs(&[("endpoint", "/hello")]).unwrap()
    );
    assert_eq!(hello[0].value, 5);
}

#[tokio::test]
async fn test_five_hellos_in_json_snapshot_endpoint() {
    let (app, _) = create_app();

    for _ in 0..5 {
        get(&app, "/hello").await;
    }

    let (status, body) = get(&app, "/metrics/snapshot").await;
    assert_eq!(status, StatusCode::OK);

    let snapshot: serde_json::Value = serde_json::from_str(&body).unwrap();
    let hello: Vec<&serde_json::Value> = snapshot
        .as_array()
        .unwrap()
        .iter()
        .filter(|entry| entry["name"] == "app.hello.requests")
        .collect();

    assert_eq!(hello.len(), 1);
    assert_eq!(hello[0]["tags"], serde_json::json!({ "endpoint": "/hello" }));
    assert_eq!(hello[0]["value"], 5);
}

#[tokio::test]
async fn test_hello_counter_unaffected_by_other_routes() {
    let (app, state) = create_app();

    get(&app, "/health").await;
    get(&app, "/metrics").await;

    assert_eq!(state.hello_requests().value(), 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = create_app();
    let (status, _) = get(&app, "/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_hellos_are_all_counted() {
    let (app, state) = create_app();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { get(&app, "/hello").await.0 })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        assert_eq!(result.expect("task should not panic"), StatusCode::OK);
    }

    assert_eq!(state.hello_requests().value(), 50);
}
