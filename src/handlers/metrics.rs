//! Metrics export endpoints
//!
//! `/metrics` serves the counter registry in Prometheus text format followed by
//! the service's self metrics. `/metrics/snapshot` serves the registry as JSON.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::AppResult;
use crate::export::{Exporter, JsonExporter, PrometheusTextExporter};
use crate::handlers::AppState;

/// Metrics handler for Prometheus scraping
///
/// # Response
///
/// - `200 OK` with metrics in Prometheus text format
/// - `500 Internal Server Error` if rendering fails
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/metrics
/// # HELP app_hello_requests_total Number of hello endpoint requests
/// # TYPE app_hello_requests_total counter
/// app_hello_requests_total{endpoint="/hello"} 42
/// ```
pub async fn handler(State(state): State<AppState>) -> AppResult<Response> {
    let exporter = PrometheusTextExporter;
    let mut body = export(&state, &exporter)?;

    let self_metrics = state.metrics().gather().inspect_err(|e| {
        tracing::error!(error = %e, "Failed to gather self metrics for scraping");
    })?;
    body.push_str(&self_metrics);

    Ok(([(header::CONTENT_TYPE, exporter.content_type())], body).into_response())
}

/// JSON snapshot of every counter series
pub async fn snapshot_handler(State(state): State<AppState>) -> AppResult<Response> {
    let exporter = JsonExporter;
    let body = export(&state, &exporter)?;
    Ok(([(header::CONTENT_TYPE, exporter.content_type())], body).into_response())
}

/// Snapshot the registry and render it, recording the outcome in self metrics
fn export(state: &AppState, exporter: &dyn Exporter) -> AppResult<String> {
    let snapshot = state.registry().snapshot();
    state.metrics().set_series(snapshot.len());

    match exporter.render(&snapshot) {
        Ok(body) => {
            state.metrics().export_succeeded(exporter.format());
            tracing::debug!(
                format = %exporter.format(),
                series = snapshot.len(),
                "Rendered counter snapshot"
            );
            Ok(body)
        }
        Err(e) => {
            state.metrics().export_failed(exporter.format());
            tracing::error!(
                format = %exporter.format(),
                series = snapshot.len(),
                error = %e,
                "Failed to render counter snapshot"
            );
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::StatusCode;
    use std::sync::Arc;

    fn create_test_state() -> AppState {
        AppState::new(Arc::new(Config::default())).expect("should create AppState")
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_handler_returns_prometheus_format() {
        let state = create_test_state();
        state.hello_requests().increment_by(3);

        let response = handler(State(state)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            crate::export::PROMETHEUS_CONTENT_TYPE
        );

        let body = body_string(response).await;
        assert!(body.contains("# TYPE app_hello_requests_total counter"));
        assert!(body.contains("app_hello_requests_total{endpoint=\"/hello\"} 3"));
        assert!(body.contains("metricslab_exports_total{format=\"prometheus\"} 1"));
        assert!(body.contains("metricslab_series 1"));
    }

    #[tokio::test]
    async fn test_snapshot_handler_returns_json() {
        let state = create_test_state();
        state.hello_requests().increment();

        let response = snapshot_handler(State(state.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            crate::export::JSON_CONTENT_TYPE
        );

        let body = body_string(response).await;
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value[0]["name"], "app.hello.requests");
        assert_eq!(value[0]["value"], 1);

        let own = state.metrics().gather().unwrap();
        assert!(own.contains("metricslab_exports_total{format=\"json\"} 1"));
    }

    #[tokio::test]
    async fn test_concurrent_metrics_scraping() {
        let state = create_test_state();
        state.hello_requests().increment_by(100);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let s = state.clone();
                tokio::spawn(async move { handler(State(s)).await.map(|r| r.status()) })
            })
            .collect();

        for handle in handles {
            let status = handle.await.expect("task should not panic").unwrap();
            assert_eq!(status, StatusCode::OK);
        }
    }
}
