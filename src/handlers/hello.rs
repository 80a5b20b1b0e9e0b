//! Hello endpoint
//!
//! Counts each call and returns a fixed greeting.

use axum::extract::State;

use crate::handlers::AppState;
use crate::registry::{Counter, CounterRegistry, RegistryError};

/// Response body for `GET /hello`
pub const GREETING: &str = "Hello, metrics!";

/// Counter incremented once per hello request
pub const HELLO_REQUESTS_METRIC: &str = "app.hello.requests";

/// Register the hello request counter
///
/// Called once at startup; the handle is cached in `AppState`.
pub fn register_counter(registry: &CounterRegistry) -> Result<Counter, RegistryError> {
    Counter::builder(HELLO_REQUESTS_METRIC)
        .description("Number of hello endpoint requests")
        .tag("endpoint", "/hello")
        .register(registry)
}

/// Hello handler
pub async fn handler(State(state): State<AppState>) -> &'static str {
    state.hello_requests().increment();
    GREETING
}
