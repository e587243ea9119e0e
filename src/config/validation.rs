//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (backoff factor, jitter, timeouts)
//! - Check that addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControllerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::ControllerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ControllerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.paths.config_file.is_absolute() {
        errors.push(ValidationError::new("paths.config_file", "must be an absolute path"));
    }
    if config.paths.ssl_dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("paths.ssl_dir", "must not be empty"));
    }

    if config.proxy.command_timeout_secs == 0 {
        errors.push(ValidationError::new("proxy.command_timeout_secs", "must be greater than 0"));
    }
    if config.proxy.control_timeout_secs == 0 {
        errors.push(ValidationError::new("proxy.control_timeout_secs", "must be greater than 0"));
    }
    match Url::parse(&config.proxy.control_endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "proxy.control_endpoint",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "proxy.control_endpoint",
            format!("invalid URL: {}", e),
        )),
    }

    let reconcile = &config.reconcile;
    if !reconcile.retry_factor.is_finite() || reconcile.retry_factor < 1.0 {
        errors.push(ValidationError::new("reconcile.retry_factor", "must be >= 1.0"));
    }
    if !(0.0..=1.0).contains(&reconcile.retry_jitter) {
        errors.push(ValidationError::new("reconcile.retry_jitter", "must be between 0.0 and 1.0"));
    }

    if config.listen.default_http_port == 0 {
        errors.push(ValidationError::new("listen.default_http_port", "must be non-zero"));
    }

    let observability = &config.observability;
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected 'pretty' or 'json', got '{}'", observability.log_format),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("admin.bind_address", "must be a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
