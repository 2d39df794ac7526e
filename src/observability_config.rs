//! # Observability Configuration
//!
//! Settings for log output, the Prometheus recorder, OTLP trace export and
//! the optional `/metrics` endpoint.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `ENVIRONMENT` | `development` |
//! | `OTLP_ENDPOINT` | unset (no trace export) |
//! | `METRICS_PORT` | `9090` |
//! | `OBSERVABILITY_LOG_LEVEL` | `info` |
//! | `ENABLE_TRACE_SAMPLING` / `TRACE_SAMPLING_RATIO` | `false` / `1.0` |
//! | `ENABLE_METRICS_EXPORT` | `true` |
//! | `METRICS_SERVER_ENABLED` | `false` |

use crate::config::{env_or, optional_env};
use crate::errors::{AppError, AppResult};

/// Service name attached to exported traces and metrics
pub const SERVICE_NAME: &str = "pantry-intake";

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// development, staging or production
    pub environment: String,
    pub otlp_endpoint: Option<String>,
    pub metrics_port: u16,
    /// Level for `pantry_intake` targets
    pub log_level: String,
    pub enable_trace_sampling: bool,
    /// Fraction of traces kept when sampling (0.0-1.0)
    pub trace_sampling_ratio: f64,
    /// Install the Prometheus recorder
    pub enable_metrics_export: bool,
    /// Serve `/metrics` and `/health/live` over HTTP
    pub metrics_server_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            otlp_endpoint: None,
            metrics_port: 9090,
            log_level: "info".to_string(),
            enable_trace_sampling: false,
            trace_sampling_ratio: 1.0,
            enable_metrics_export: true,
            // a one-shot CLI run rarely wants a listening socket
            metrics_server_enabled: false,
        }
    }
}

impl ObservabilityConfig {
    /// Read the observability variables, keeping defaults for unset ones
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            environment: optional_env("ENVIRONMENT").unwrap_or(defaults.environment),
            otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            metrics_port: env_or("METRICS_PORT", defaults.metrics_port)?,
            log_level: optional_env("OBSERVABILITY_LOG_LEVEL").unwrap_or(defaults.log_level),
            enable_trace_sampling: env_or("ENABLE_TRACE_SAMPLING", defaults.enable_trace_sampling)?,
            trace_sampling_ratio: env_or("TRACE_SAMPLING_RATIO", defaults.trace_sampling_ratio)?,
            enable_metrics_export: env_or("ENABLE_METRICS_EXPORT", defaults.enable_metrics_export)?,
            metrics_server_enabled: env_or(
                "METRICS_SERVER_ENABLED",
                defaults.metrics_server_enabled,
            )?,
        })
    }

    /// Development: verbose logs, every trace kept
    pub fn development() -> Self {
        Self {
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Production: sampled traces and the metrics endpoint enabled
    pub fn production() -> Self {
        Self {
            environment: "production".to_string(),
            log_level: "warn".to_string(),
            enable_trace_sampling: true,
            trace_sampling_ratio: 0.1,
            metrics_server_enabled: true,
            ..Self::default()
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn validate(&self) -> AppResult<()> {
        fn invalid(what: &str, value: impl std::fmt::Display) -> AppResult<()> {
            Err(AppError::Config(format!("Invalid {}: {}", what, value)))
        }

        if let Some(endpoint) = &self.otlp_endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return invalid("OTLP endpoint", endpoint);
            }
        }
        if !(0.0..=1.0).contains(&self.trace_sampling_ratio) {
            return invalid("trace sampling ratio", self.trace_sampling_ratio);
        }
        if self.metrics_port == 0 {
            return invalid("metrics port", self.metrics_port);
        }
        if self.log_level.parse::<tracing::Level>().is_err() {
            return invalid("log level", &self.log_level);
        }
        Ok(())
    }
}
