//! Configuration management for metricslab
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section is optional; an empty file yields the defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::metrics::SELF_METRICS_PREFIX;
use crate::registry::{CounterRegistry, RegistryLimits, Tags};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub instrumentation: InstrumentationConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Counter registry configuration
///
/// Cardinality limits are opt-in. Leaving them unset keeps the registry
/// unbounded, which is only safe while every tag value comes from a small,
/// fixed set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Maximum series across all counter names
    #[serde(default)]
    pub max_series: Option<usize>,
    /// Maximum series under a single counter name
    #[serde(default)]
    pub max_series_per_name: Option<usize>,
    /// Tags added to every series unless the caller sets the same key
    #[serde(default)]
    pub common_tags: BTreeMap<String, String>,
}

impl RegistryConfig {
    pub fn limits(&self) -> RegistryLimits {
        RegistryLimits {
            max_series: self.max_series,
            max_series_per_name: self.max_series_per_name,
        }
    }

    /// Common tags as a canonical tag set
    pub fn common_tags(&self) -> AppResult<Tags> {
        let pairs: Vec<(&str, &str)> = self
            .common_tags
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Tags::from_pairs(&pairs)
            .and_then(|tags| tags.ensure_distinct_labels().map(|()| tags))
            .map_err(|e| AppError::Config(format!("registry.common_tags is invalid: {}", e)))
    }

    /// Construct the process counter registry from these settings
    ///
    /// The self-metrics prefix is reserved so application counters cannot
    /// shadow those families in the `/metrics` scrape.
    pub fn build_registry(&self) -> AppResult<CounterRegistry> {
        Ok(CounterRegistry::new()
            .with_limits(self.limits())
            .with_common_tags(self.common_tags()?)
            .with_reserved_prefix(SELF_METRICS_PREFIX))
    }
}

/// Request instrumentation toggles
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentationConfig {
    /// Count every served request as `http.server.requests`
    #[serde(default = "default_true")]
    pub http_requests: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            http_requests: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config.validate().map_err(|e| match e {
            AppError::Config(reason) => AppError::ConfigValidationFailed {
                path: path_display,
                reason,
            },
            other => other,
        })?;

        Ok(config)
    }

    /// Address the HTTP server binds to
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip: IpAddr = self.server.host.parse().map_err(|_| {
            AppError::Config(format!(
                "server.host '{}' is not a valid IP address",
                self.server.host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()` and `from_str()`, but can
    /// also be called explicitly when constructing Config by hand.
    pub fn validate(&self) -> AppResult<()> {
        self.socket_addr()?;

        if self.server.port == 0 {
            return Err(AppError::Config(
                "server.port must be greater than 0".to_string(),
            ));
        }

        for (field, value) in [
            ("registry.max_series", self.registry.max_series),
            ("registry.max_series_per_name", self.registry.max_series_per_name),
        ] {
            if value == Some(0) {
                return Err(AppError::Config(format!(
                    "{} must be greater than 0 when set (omit it for no limit)",
                    field
                )));
            }
        }

        if let (Some(total), Some(per_name)) =
            (self.registry.max_series, self.registry.max_series_per_name)
        {
            if per_name > total {
                return Err(AppError::Config(format!(
                    "registry.max_series_per_name ({}) cannot exceed registry.max_series ({})",
                    per_name, total
                )));
            }
        }

        self.registry.common_tags()?;

        let level = self.observability.log_level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(AppError::Config(format!(
                "observability.log_level '{}' is not one of {:?}",
                self.observability.log_level, LOG_LEVELS
            )));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
