//! Telemetry and observability setup
//!
//! Configures structured logging with tracing and tracing-subscriber.

use std::sync::Once;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

static INIT: Once = Once::new();

/// Build the default filter directive for a log level
pub fn default_directive(level: &str) -> String {
    format!(
        "metricslab={},tower_http=debug",
        level.to_ascii_lowercase()
    )
}

/// Initialize tracing subscriber for structured logging
///
/// This can only be called once per process. Subsequent calls are ignored. If
/// another global subscriber is already installed it is kept and a notice goes
/// to stderr.
///
/// Reads log level from RUST_LOG environment variable, defaulting to the
/// level specified in config (or "info" if not set).
///
/// # Examples
///
/// ```no_run
/// metricslab::telemetry::init("info");
/// tracing::info!("Application started");
/// ```
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        if let Err(e) = try_install(default_level) {
            eprintln!("metricslab: keeping existing tracing subscriber: {}", e);
        }
    });
}

/// Install the global subscriber, failing if one is already set
fn try_install(default_level: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(default_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
