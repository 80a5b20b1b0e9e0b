//! metricslab - hello service instrumented with a tagged counter registry
//!
//! The interesting part is [`registry`]: a concurrency-safe store of counters
//! keyed by name and canonical tag set, with lock-free increments and
//! point-in-time snapshots. [`export`] renders snapshots for scraping, and
//! [`handlers`] wires it all behind a small axum service.

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod telemetry;
