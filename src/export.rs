//! Snapshot exporters
//!
//! Turn a registry snapshot into an exposition format. Exporters are pure
//! serializers: they never touch the registry themselves.

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use thiserror::Error;

use crate::registry::CounterSample;
use crate::registry::naming::{label_name, metric_name};

/// Content type for Prometheus text exposition 0.0.4
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Content type for the JSON snapshot
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Export format, used for routing and self-metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Prometheus,
    Json,
}

impl ExportFormat {
    /// Label string for self metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Prometheus => "prometheus",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize snapshot as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write exposition text: {0}")]
    Write(#[from] fmt::Error),

    #[error("Series '{name}' exports label '{label}' more than once")]
    DuplicateLabel { name: String, label: String },
}

/// A serializer for registry snapshots
pub trait Exporter: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn content_type(&self) -> &'static str;

    /// Render `samples` (as returned by `CounterRegistry::snapshot`)
    ///
    /// # Errors
    ///
    /// Returns `ExportError` if serialization fails.
    fn render(&self, samples: &[CounterSample]) -> Result<String, ExportError>;
}

/// Prometheus text exposition
///
/// Registry names use dotted notation (`app.hello.requests`); on export they
/// become Prometheus family names with a `_total` suffix
/// (`app_hello_requests_total`). Series whose names map to the same family are
/// grouped under one `# HELP`/`# TYPE` header, and series that end up with the
/// same family and label set (`a.b` and `a_b`) are summed into one line so the
/// scrape never repeats a series.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusTextExporter;

/// Series of one exported family, keyed by rendered label set
#[derive(Default)]
struct Family<'a> {
    description: Option<&'a str>,
    first_name: Option<&'a str>,
    series: BTreeMap<String, u64>,
}

impl Exporter for PrometheusTextExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Prometheus
    }

    fn content_type(&self) -> &'static str {
        PROMETHEUS_CONTENT_TYPE
    }

    fn render(&self, samples: &[CounterSample]) -> Result<String, ExportError> {
        let mut families: BTreeMap<String, Family<'_>> = BTreeMap::new();
        for sample in samples {
            let labels = render_labels(sample)?;
            let family = families.entry(counter_family_name(&sample.name)).or_default();
            if family.description.is_none() {
                family.description = sample.description.as_deref();
            }
            family.first_name.get_or_insert(sample.name.as_str());
            let value = family.series.entry(labels).or_insert(0);
            *value = value.saturating_add(sample.value);
        }

        let mut out = String::new();
        for (name, family) in &families {
            let help = family
                .description
                .or(family.first_name)
                .unwrap_or_default();
            writeln!(out, "# HELP {} {}", name, escape_help(help))?;
            writeln!(out, "# TYPE {} counter", name)?;

            for (labels, value) in &family.series {
                writeln!(out, "{}{} {}", name, labels, value)?;
            }
        }

        Ok(out)
    }
}

/// `{k="v",...}` sorted by exported label name, or empty for an untagged series
fn render_labels(sample: &CounterSample) -> Result<String, ExportError> {
    if sample.tags.is_empty() {
        return Ok(String::new());
    }

    let mut labels: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in sample.tags.iter() {
        let label = label_name(key);
        if labels.contains_key(&label) {
            return Err(ExportError::DuplicateLabel {
                name: sample.name.clone(),
                label,
            });
        }
        labels.insert(label, escape_label_value(value));
    }

    let body = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, v))
        .collect::<Vec<_>>()
        .join(",");
    Ok(format!("{{{}}}", body))
}

/// JSON array of `{name, tags, value, description?}`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExporter;

impl Exporter for JsonExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn render(&self, samples: &[CounterSample]) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(samples)?)
    }
}

/// Map a registry name onto a Prometheus counter family name
pub fn counter_family_name(name: &str) -> String {
    let mut family = metric_name(name);
    if !family.ends_with("_total") {
        family.push_str("_total");
    }
    family
}

fn escape_label_value(v: &str) -> String {
    v.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}
