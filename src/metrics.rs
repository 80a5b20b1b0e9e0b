//! Self metrics for metricslab
//!
//! The service's own operational counters, kept apart from the application
//! counter registry so a misbehaving caller cannot crowd them out:
//! - Identity rejections by reason (invalid identity, cardinality limit)
//! - Export runs and failures by format
//! - Live series in the counter registry
//!
//! They are appended to the `/metrics` scrape in Prometheus text format.

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::export::ExportFormat;
use crate::registry::RegistryError;

/// Prefix shared by every self metric family
///
/// The counter registry reserves it, so an application counter can never
/// export under a name that collides with one of these.
pub const SELF_METRICS_PREFIX: &str = "metricslab_";

/// Operational metrics for the service itself
#[derive(Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
    identity_rejections: IntCounterVec,
    exports: IntCounterVec,
    export_failures: IntCounterVec,
    series: IntGauge,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// # Errors
    ///
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Cardinality: 2 reasons (invalid_identity, cardinality_limit)
        let identity_rejections = IntCounterVec::new(
            Opts::new(
                "metricslab_identity_rejections_total",
                "Counter lookups rejected by the registry, by reason",
            ),
            &["reason"],
        )?;

        // Cardinality: 2 formats (prometheus, json)
        let exports = IntCounterVec::new(
            Opts::new(
                "metricslab_exports_total",
                "Snapshot exports rendered, by format",
            ),
            &["format"],
        )?;

        let export_failures = IntCounterVec::new(
            Opts::new(
                "metricslab_export_failures_total",
                "Snapshot exports that failed to render, by format",
            ),
            &["format"],
        )?;

        let series = IntGauge::with_opts(Opts::new(
            "metricslab_series",
            "Series currently held by the counter registry",
        ))?;

        registry.register(Box::new(identity_rejections.clone()))?;
        registry.register(Box::new(exports.clone()))?;
        registry.register(Box::new(export_failures.clone()))?;
        registry.register(Box::new(series.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            identity_rejections,
            exports,
            export_failures,
            series,
        })
    }

    /// Count a rejected counter lookup
    pub fn identity_rejected(&self, error: &RegistryError) {
        self.identity_rejections
            .with_label_values(&[error.reason_label()])
            .inc();
    }

    /// Total rejections across all reasons
    pub fn identity_rejections_count(&self) -> u64 {
        ["invalid_identity", "cardinality_limit"]
            .iter()
            .map(|reason| self.identity_rejections.with_label_values(&[*reason]).get())
            .sum()
    }

    pub fn export_succeeded(&self, format: ExportFormat) {
        self.exports.with_label_values(&[format.as_str()]).inc();
    }

    pub fn export_failed(&self, format: ExportFormat) {
        self.export_failures
            .with_label_values(&[format.as_str()])
            .inc();
    }

    /// Record the registry's current series count
    pub fn set_series(&self, count: usize) {
        self.series.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Gather all self metrics and encode them in Prometheus text format
    ///
    /// # Errors
    ///
    /// Returns an error if metric encoding fails.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let metric_count = metric_families.len();

        tracing::debug!(
            metric_family_count = metric_count,
            "Encoding self metrics to Prometheus text format"
        );

        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();

        encoder.encode(&metric_families, &mut buffer).map_err(|e| {
            tracing::error!(
                error = %e,
                metric_family_count = metric_count,
                "Prometheus text encoder failed"
            );
            prometheus::Error::Msg(format!(
                "Failed to encode {} metric families: {}",
                metric_count, e
            ))
        })?;

        String::from_utf8(buffer).map_err(|e| {
            let valid_up_to = e.utf8_error().valid_up_to();
            tracing::error!(
                invalid_byte_index = valid_up_to,
                "Prometheus encoder produced invalid UTF-8"
            );
            prometheus::Error::Msg(format!(
                "Failed to convert metrics to UTF-8 at byte {}: {}",
                valid_up_to, e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LimitScope;

    #[test]
    fn test_metrics_new_creates_registry() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.export_succeeded(ExportFormat::Prometheus);
        metrics.set_series(3);

        let output = metrics.gather().expect("Failed to gather metrics");
        assert!(output.contains("metricslab_exports_total"));
        assert!(output.contains("metricslab_series 3"));
    }

    #[test]
    fn test_identity_rejections_by_reason() {
        let metrics = Metrics::new().expect("Failed to create metrics");

        metrics.identity_rejected(&RegistryError::InvalidIdentity {
            reason: "empty".to_string(),
        });
        metrics.identity_rejected(&RegistryError::CardinalityLimitExceeded {
            name: "x".to_string(),
            limit: 1,
            scope: LimitScope::Registry,
        });
        metrics.identity_rejected(&RegistryError::CardinalityLimitExceeded {
            name: "x".to_string(),
            limit: 1,
            scope: LimitScope::Name,
        });

        assert_eq!(metrics.identity_rejections_count(), 3);

        let output = metrics.gather().unwrap();
        assert!(
            output.contains("metricslab_identity_rejections_total{reason=\"invalid_identity\"} 1")
        );
        assert!(
            output.contains("metricslab_identity_rejections_total{reason=\"cardinality_limit\"} 2")
        );
    }

    #[test]
    fn test_export_failures_by_format() {
        let metrics = Metrics::new().unwrap();
        metrics.export_failed(ExportFormat::Json);

        let output = metrics.gather().unwrap();
        assert!(output.contains("metricslab_export_failures_total{format=\"json\"} 1"));
    }

    #[test]
    fn test_gather_has_help_and_type() {
        let metrics = Metrics::new().unwrap();
        metrics.export_succeeded(ExportFormat::Json);

        let output = metrics.gather().unwrap();
        assert!(output.contains("# HELP metricslab_exports_total"));
        assert!(output.contains("# TYPE metricslab_exports_total counter"));
        assert!(output.contains("# TYPE metricslab_series gauge"));
    }

    #[test]
    fn test_metrics_is_clonable() {
        let metrics = Metrics::new().unwrap();
        let clone = metrics.clone();
        clone.export_succeeded(ExportFormat::Prometheus);

        assert!(
            metrics
                .gather()
                .unwrap()
                .contains("metricslab_exports_total{format=\"prometheus\"} 1")
        );
    }

    #[test]
    fn test_concurrent_recording() {
        use std::thread;

        let metrics = Arc::new(Metrics::new().unwrap());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.identity_rejected(&RegistryError::InvalidIdentity {
                            reason: "test".to_string(),
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread should not panic");
        }

        assert_eq!(metrics.identity_rejections_count(), 1000);
    }
}
