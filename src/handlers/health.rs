//! Health check endpoint
//!
//! Provides a simple health check for monitoring and load balancers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Series currently held by the counter registry
    pub series: usize,
    /// Counter lookups rejected since startup
    pub identity_rejections: u64,
}

/// Health check handler
///
/// Always 200 OK; registry figures are informational.
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            series: state.registry().len(),
            identity_rejections: state.metrics().identity_rejections_count(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    fn create_test_state() -> AppState {
        AppState::new(Arc::new(Config::default())).expect("should create AppState")
    }

    #[tokio::test]
    async fn test_health_handler_returns_ok() {
        let state = create_test_state();
        let (status, Json(body)) = handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "OK");
        assert_eq!(body.series, 1);
        assert_eq!(body.identity_rejections, 0);
    }

    #[tokio::test]
    async fn test_health_handler_reports_rejections() {
        let state = create_test_state();
        state.counter("", &[]);

        let (status, Json(body)) = handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.identity_rejections, 1);
    }
}
