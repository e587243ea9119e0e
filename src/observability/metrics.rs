//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define reconciliation metrics (reloads, errors, last config state)
//! - Track per-host certificate expiry and per-backend endpoint counts
//! - Expose a Prometheus-compatible endpoint
//!
//! # Metrics
//! - `ingress_controller_reloads_total` (counter): successful full reloads
//! - `ingress_controller_reload_errors_total` (counter): failed full reloads
//! - `ingress_controller_config_last_reload_successful` (gauge): 1=ok, 0=failed
//! - `ingress_controller_config_hash` (gauge): fingerprint of the last attempted config
//! - `ingress_controller_ssl_expire_time_seconds` (gauge): per host
//! - `ingress_controller_ssl_certificate_info` (gauge): 1 per host, labelled with
//!   the certificate name, identity and serial number
//! - `ingress_controller_backend_endpoints` (gauge): per backend
//! - `ingress_controller_removed_resources_total` (counter): by kind
//!
//! # Design Decisions
//! - The orchestrator talks to a trait; the exporter-backed implementation is one choice
//! - Series for removed hosts/backends stop being updated and are dropped by
//!   the exporter's idle timeout

use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use metrics_util::MetricKindMask;

use crate::model::{Backend, Server};
use crate::reconcile::differ::RemovedResources;
use crate::reconcile::fingerprint::Fingerprint;

/// Receiver of reconciliation metrics.
pub trait MetricsCollector: Send + Sync {
    fn inc_reload_count(&self);
    fn inc_reload_error_count(&self);
    /// Record the outcome of a configuration attempt identified by its fingerprint.
    fn config_success(&self, fingerprint: Fingerprint, success: bool);
    fn set_ssl_expire_time(&self, servers: &[Server]);
    /// Publish which certificate each TLS host currently serves.
    fn set_ssl_info(&self, servers: &[Server]);
    fn set_backend_endpoints(&self, backends: &[Backend]);
    /// Drop series that refer to resources gone from the configuration.
    fn remove_metrics(&self, removed: &RemovedResources);
}

/// Install the Prometheus exporter on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr, idle_timeout: Duration) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .idle_timeout(MetricKindMask::GAUGE, Some(idle_timeout))
        .install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Label values of the certificate info gauge for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub host: String,
    pub name: String,
    /// Content identity of the PEM bytes.
    pub identifier: String,
    /// Empty when the certificate carries no serial number.
    pub serial_number: String,
}

impl CertificateInfo {
    /// Labels for `server`, or `None` when it serves no certificate.
    pub fn of(server: &Server) -> Option<Self> {
        let cert = server.tls.as_ref()?;
        Some(Self {
            host: server.hostname.clone(),
            name: cert.name.clone(),
            identifier: cert.identity(),
            serial_number: cert.serial_number.clone().unwrap_or_default(),
        })
    }
}

/// Collector backed by the global `metrics` recorder.
#[derive(Debug, Clone, Default)]
pub struct PrometheusMetrics;

impl MetricsCollector for PrometheusMetrics {
    fn inc_reload_count(&self) {
        counter!("ingress_controller_reloads_total").increment(1);
    }

    fn inc_reload_error_count(&self) {
        counter!("ingress_controller_reload_errors_total").increment(1);
    }

    fn config_success(&self, fingerprint: Fingerprint, success: bool) {
        gauge!("ingress_controller_config_hash").set(fingerprint.as_gauge());
        gauge!("ingress_controller_config_last_reload_successful").set(if success { 1.0 } else { 0.0 });
        if success {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64();
            gauge!("ingress_controller_config_last_reload_successful_timestamp_seconds").set(now);
        }
    }

    fn set_ssl_expire_time(&self, servers: &[Server]) {
        for server in servers {
            let Some(expires_at) = server.tls.as_ref().and_then(|c| c.expires_at) else {
                continue;
            };
            gauge!("ingress_controller_ssl_expire_time_seconds", "host" => server.hostname.clone())
                .set(expires_at as f64);
        }
    }

    fn set_ssl_info(&self, servers: &[Server]) {
        for info in servers.iter().filter_map(CertificateInfo::of) {
            gauge!(
                "ingress_controller_ssl_certificate_info",
                "host" => info.host,
                "secret_name" => info.name,
                "identifier" => info.identifier,
                "serial_number" => info.serial_number
            )
            .set(1.0);
        }
    }

    fn set_backend_endpoints(&self, backends: &[Backend]) {
        for backend in backends {
            gauge!("ingress_controller_backend_endpoints", "backend" => backend.name.clone())
                .set(backend.endpoints.len() as f64);
        }
    }

    fn remove_metrics(&self, removed: &RemovedResources) {
        if removed.is_empty() {
            return;
        }
        counter!("ingress_controller_removed_resources_total", "kind" => "backend")
            .increment(removed.backends.len() as u64);
        counter!("ingress_controller_removed_resources_total", "kind" => "host")
            .increment(removed.hosts.len() as u64);
        counter!("ingress_controller_removed_resources_total", "kind" => "certificate")
            .increment(removed.certificates.len() as u64);
        tracing::debug!(
            backends = ?removed.backends,
            hosts = ?removed.hosts,
            certificates = ?removed.certificates,
            "Stopped tracking metrics for removed resources"
        );
    }
}

/// Collector that discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopMetrics;

impl MetricsCollector for NoopMetrics {
    fn inc_reload_count(&self) {}
    fn inc_reload_error_count(&self) {}
    fn config_success(&self, _fingerprint: Fingerprint, _success: bool) {}
    fn set_ssl_expire_time(&self, _servers: &[Server]) {}
    fn set_ssl_info(&self, _servers: &[Server]) {}
    fn set_backend_endpoints(&self, _backends: &[Backend]) {}
    fn remove_metrics(&self, _removed: &RemovedResources) {}
}
