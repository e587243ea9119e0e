//! Configuration schema definitions.
//!
//! This module defines the controller settings. All types derive Serde
//! traits for deserialization from a TOML file and every section has defaults.

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// Root configuration for the reconciler.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    /// Filesystem layout (artifact path, TLS directory).
    pub paths: PathsConfig,

    /// Proxy process and control surface.
    pub proxy: ProxyConfig,

    /// Reconciliation behavior (retries, settle delay).
    pub reconcile: ReconcileConfig,

    /// Listener ports used when rendering the artifact.
    pub listen: ListenConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Where desired-configuration snapshots come from.
    pub source: SourceConfig,

    /// Local status endpoint.
    pub admin: AdminConfig,
}

/// Filesystem layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Live configuration artifact read by the proxy.
    pub config_file: PathBuf,

    /// Directory holding the default certificate and DH parameters.
    pub ssl_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("/etc/nginx/nginx.conf"),
            ssl_dir: PathBuf::from("/etc/ingress-controller/ssl"),
        }
    }
}

/// Proxy process control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Proxy binary used for dry runs and reload commands.
    pub binary: PathBuf,

    /// Deadline for a single dry-run or reload command in seconds.
    pub command_timeout_secs: u64,

    /// Base URL of the local-only dynamic control surface.
    pub control_endpoint: String,

    /// Per-request timeout for the control surface in seconds.
    pub control_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("/usr/sbin/nginx"),
            command_timeout_secs: 30,
            control_endpoint: "http://127.0.0.1:10246".to_string(),
            control_timeout_secs: 10,
        }
    }
}

/// Reconciliation behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Retries of the dynamic push after the first attempt.
    pub dynamic_retries: u32,

    /// Delay before the first retry in milliseconds.
    pub retry_initial_ms: u64,

    /// Multiplicative backoff factor.
    pub retry_factor: f64,

    /// Jitter as a fraction of each delay (0.0 - 1.0).
    pub retry_jitter: f64,

    /// Settle delay after the very first reconciliation, in milliseconds.
    pub first_sync_delay_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            dynamic_retries: 15,
            retry_initial_ms: 1000,
            retry_factor: 1.3,
            retry_jitter: 0.1,
            first_sync_delay_ms: 1000,
        }
    }
}

/// Listener ports referenced by the rendered artifact.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenConfig {
    /// Port of the catch-all HTTP server.
    pub default_http_port: u16,

    /// Port of the internal status server used by health probes.
    pub status_port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            default_http_port: 80,
            status_port: 10246,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Seconds after which a series that stopped being updated is dropped.
    pub metrics_idle_timeout_secs: u64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:10254".to_string(),
            metrics_idle_timeout_secs: 600,
        }
    }
}

/// Snapshot source settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// JSON snapshot file watched for changes.
    pub snapshot_file: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            snapshot_file: PathBuf::from("/var/run/ingress-controller/snapshot.json"),
        }
    }
}

/// Status endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the status endpoint.
    pub enabled: bool,

    /// Status endpoint bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:10255".to_string(),
        }
    }
}
