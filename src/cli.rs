//! Command-line interface for metricslab
//!
//! Provides argument parsing and subcommand handling for the metricslab binary.

use clap::{Parser, Subcommand};

/// Hello service instrumented with a tagged counter registry
#[derive(Parser)]
#[command(name = "metricslab")]
#[command(version)]
#[command(about = "Hello service instrumented with a tagged counter registry")]
#[command(
    long_about = "metricslab serves GET /hello, counting each call in a tagged counter \
    registry exposed at /metrics (Prometheus text) and /metrics/snapshot (JSON)."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# metricslab configuration
#
# Every section is optional. Omitted values fall back to the defaults shown.

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 8080

[registry]
# Cardinality limits. Omit a key for no limit. Requests that would create a
# series past a limit are rejected instead of growing the registry.
# max_series = 10000
# max_series_per_name = 1000

# Tags attached to every series unless the caller sets the same key
[registry.common_tags]
application = "metricslab"

[instrumentation]
# Count every served request as http.server.requests{method, uri, status}
http_requests = true

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
# RUST_LOG overrides this when set.
log_level = "info"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_path() {
        let cli = Cli::parse_from(["metricslab"]);
        assert_eq!(cli.config, "config.toml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn custom_config_path() {
        let cli = Cli::parse_from(["metricslab", "--config", "custom.toml"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn serve_subcommand() {
        let cli = Cli::parse_from(["metricslab", "serve", "-c", "other.toml"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
        assert_eq!(cli.config, "other.toml");
    }

    #[test]
    fn config_subcommand() {
        let cli = Cli::parse_from(["metricslab", "config"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: None })
        ));
    }

    #[test]
    fn config_subcommand_with_output() {
        let cli = Cli::parse_from(["metricslab", "config", "-o", "my-config.toml"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config { output: Some(ref path) }) if path == "my-config.toml"
        ));
    }

    #[test]
    fn template_is_valid_config() {
        let template = generate_config_template();
        let config: Result<crate::config::Config, _> = template.parse();
        assert!(
            config.is_ok(),
            "Template should be a valid config: {:?}",
            config.err()
        );
    }

    #[test]
    fn template_has_all_sections() {
        let template = generate_config_template();
        assert!(template.contains("[server]"));
        assert!(template.contains("[registry]"));
        assert!(template.contains("[registry.common_tags]"));
        assert!(template.contains("[instrumentation]"));
        assert!(template.contains("[observability]"));
    }
}
