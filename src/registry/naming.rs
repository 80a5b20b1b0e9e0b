//! Exposition names for registry identities
//!
//! Registry names and tag keys are free-form; Prometheus names are not. These
//! mappings live next to the registry so identity validation and the exporter
//! agree on which identities would collide once exported.

/// Map a registry name onto a valid Prometheus metric name
///
/// Characters outside `[a-zA-Z0-9_:]` become `_`, and a leading digit gets a
/// `_` prefix: `app.hello.requests` becomes `app_hello_requests`.
pub fn metric_name(raw: &str) -> String {
    sanitize(raw, true)
}

/// Map a tag key onto a valid Prometheus label name (no colons)
pub fn label_name(raw: &str) -> String {
    sanitize(raw, false)
}

fn sanitize(raw: &str, allow_colon: bool) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    for (idx, ch) in raw.chars().enumerate() {
        if idx == 0 && ch.is_ascii_digit() {
            out.push('_');
        }
        let valid = ch.is_ascii_alphanumeric() || ch == '_' || (allow_colon && ch == ':');
        out.push(if valid { ch } else { '_' });
    }
    out
}
