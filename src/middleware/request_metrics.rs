//! Per-request counting middleware
//!
//! Counts every routed request as `http.server.requests{method, uri, status}`.
//! `uri` is the matched route template rather than the raw path, so path
//! parameters cannot inflate cardinality.

use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::handlers::AppState;

/// Counter incremented once per served request
pub const HTTP_REQUESTS_METRIC: &str = "http.server.requests";

/// `uri` tag value when no route template is attached to the request
pub const UNMATCHED_URI: &str = "UNKNOWN";

/// Collapse non-standard methods into one tag value
pub fn method_tag(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        "PATCH" => "PATCH",
        "TRACE" => "TRACE",
        "CONNECT" => "CONNECT",
        _ => "OTHER",
    }
}

/// Middleware that counts each request once its response is ready
///
/// Install with `route_layer` so the matched route template is available.
/// The response is passed through unchanged whether or not counting succeeds.
pub async fn request_metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = method_tag(request.method());
    let uri = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_URI.to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    if let Some(counter) = state.counter(
        HTTP_REQUESTS_METRIC,
        &[
            ("method", method),
            ("uri", uri.as_str()),
            ("status", status.as_str()),
        ],
    ) {
        counter.increment();
    }

    tracing::trace!(method, uri = %uri, status = %status, "Counted request");

    response
}
