//! HTTP request handlers for the metricslab API

use axum::{Router, middleware::from_fn_with_state, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AppResult;
use crate::metrics::Metrics;
use crate::middleware::request_metrics_middleware;
use crate::registry::{Counter, CounterRegistry};

pub mod health;
pub mod hello;
pub mod metrics;

/// Application state shared across all handlers
///
/// Built once at startup and handed to the router; there is no global
/// registry. All fields are Arc'd (or Arc-backed) for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    registry: Arc<CounterRegistry>,
    metrics: Metrics,
    hello_requests: Counter,
}

impl AppState {
    /// Create a new AppState, building the counter registry from configuration
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let registry = Arc::new(config.registry.build_registry()?);
        Self::with_registry(config, registry)
    }

    /// Create a new AppState around an existing registry
    pub fn with_registry(config: Arc<Config>, registry: Arc<CounterRegistry>) -> AppResult<Self> {
        let metrics = Metrics::new()?;
        let hello_requests = hello::register_counter(&registry)?;

        tracing::info!(
            counter = %hello_requests.id(),
            "Registered hello request counter"
        );

        Ok(Self {
            config,
            registry,
            metrics,
            hello_requests,
        })
    }

    /// Get reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get reference to the counter registry
    pub fn registry(&self) -> &Arc<CounterRegistry> {
        &self.registry
    }

    /// Get reference to the self metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Cached handle for `app.hello.requests{endpoint="/hello"}`
    pub fn hello_requests(&self) -> &Counter {
        &self.hello_requests
    }

    /// Resolve a counter for a per-request call site
    ///
    /// Rejections are logged and counted in self metrics rather than surfaced:
    /// failing to count a request must not fail the request.
    pub fn counter(&self, name: &str, tags: &[(&str, &str)]) -> Option<Counter> {
        match self.registry.get_or_create_counter(name, tags) {
            Ok(counter) => Some(counter),
            Err(e) => {
                self.metrics.identity_rejected(&e);
                tracing::warn!(
                    metric = name,
                    error = %e,
                    "Counter lookup rejected; event not counted"
                );
                None
            }
        }
    }
}

/// Build the application router
///
/// Routes are registered explicitly here; this is the only place a path is
/// mapped to a handler.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/hello", get(hello::handler))
        .route("/metrics", get(metrics::handler))
        .route("/metrics/snapshot", get(metrics::snapshot_handler))
        .route("/health", get(health::handler));

    if state.config().instrumentation.http_requests {
        app = app.route_layer(from_fn_with_state(
            state.clone(),
            request_metrics_middleware,
        ));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
