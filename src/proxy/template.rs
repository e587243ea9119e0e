//! Rendering of the proxy's static configuration artifact.
//!
//! # Responsibilities
//! - Turn a snapshot into the proxy's native configuration text
//! - Reject snapshots that cannot produce a coherent artifact
//!
//! # Design Decisions
//! - Upstream selection is delegated to the dynamic balancer, so endpoint
//!   lists never appear in the artifact
//! - Server certificates are served dynamically; only the default
//!   certificate and DH parameters are referenced by path

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use crate::config::schema::ListenConfig;
use crate::model::{L4Service, Server, Snapshot};
use crate::reconcile::fingerprint::Fingerprint;

/// Errors raised while rendering an artifact.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("server with empty hostname on port {0}")]
    EmptyHostname(u16),

    #[error("duplicate server {hostname}:{port}")]
    DuplicateServer { hostname: String, port: u16 },

    #[error("location {path} on {hostname} references unknown backend '{backend}'")]
    UnknownBackend {
        hostname: String,
        path: String,
        backend: String,
    },

    #[error("formatting failed")]
    Format(#[from] std::fmt::Error),
}

/// Values computed by the orchestrator that the artifact must reference.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub fingerprint: Fingerprint,
    pub default_certificate: Option<&'a Path>,
    pub dh_param: Option<&'a Path>,
    pub listen: &'a ListenConfig,
}

/// Produces the full configuration artifact for a snapshot.
pub trait ConfigRenderer: Send + Sync {
    fn render(&self, snapshot: &Snapshot, ctx: &RenderContext<'_>) -> Result<String, RenderError>;
}

/// Renders nginx configuration syntax.
#[derive(Debug, Clone, Default)]
pub struct NginxRenderer;

impl ConfigRenderer for NginxRenderer {
    fn render(&self, snapshot: &Snapshot, ctx: &RenderContext<'_>) -> Result<String, RenderError> {
        check(snapshot)?;

        let mut out = String::new();
        writeln!(out, "# Configuration checksum: {}", ctx.fingerprint)?;
        writeln!(out, "# Generation: {}", snapshot.generation)?;
        writeln!(out)?;
        writeln!(out, "worker_processes auto;")?;
        writeln!(out)?;
        writeln!(out, "events {{")?;
        writeln!(out, "    worker_connections 16384;")?;
        writeln!(out, "}}")?;
        writeln!(out)?;

        writeln!(out, "http {{")?;
        writeln!(out, "    upstream upstream_balancer {{")?;
        writeln!(out, "        server 0.0.0.1;")?;
        writeln!(out, "        balancer_by_lua_block {{ balancer.balance() }}")?;
        writeln!(out, "        keepalive 320;")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        if let Some(cert) = ctx.default_certificate {
            writeln!(out, "    ssl_certificate {};", cert.display())?;
            writeln!(out, "    ssl_certificate_key {};", cert.display())?;
        }
        if let Some(dh) = ctx.dh_param {
            writeln!(out, "    ssl_dhparam {};", dh.display())?;
        }

        writeln!(out)?;
        writeln!(out, "    server {{")?;
        writeln!(out, "        listen {} default_server;", ctx.listen.default_http_port)?;
        writeln!(out, "        server_name _;")?;
        writeln!(out, "        location / {{ return 404; }}")?;
        writeln!(out, "    }}")?;

        writeln!(out)?;
        writeln!(out, "    server {{")?;
        writeln!(out, "        listen 127.0.0.1:{};", ctx.listen.status_port)?;
        writeln!(out, "        location /healthz {{ return 200; }}")?;
        writeln!(out, "        location /configuration {{ content_by_lua_block {{ configuration.call() }} }}")?;
        writeln!(out, "    }}")?;

        for server in &snapshot.servers {
            render_server(&mut out, server)?;
        }
        writeln!(out, "}}")?;

        if !snapshot.tcp_services.is_empty() || !snapshot.udp_services.is_empty() {
            writeln!(out)?;
            writeln!(out, "stream {{")?;
            writeln!(out, "    upstream upstream_balancer {{")?;
            writeln!(out, "        server 0.0.0.1:1234;")?;
            writeln!(out, "        balancer_by_lua_block {{ tcp_udp_balancer.balance() }}")?;
            writeln!(out, "    }}")?;
            for service in &snapshot.tcp_services {
                render_l4(&mut out, service, false)?;
            }
            for service in &snapshot.udp_services {
                render_l4(&mut out, service, true)?;
            }
            writeln!(out, "}}")?;
        }

        Ok(out)
    }
}

fn check(snapshot: &Snapshot) -> Result<(), RenderError> {
    let backends: BTreeSet<&str> = snapshot.backends.iter().map(|b| b.name.as_str()).collect();
    let mut seen = BTreeSet::new();

    for server in &snapshot.servers {
        if server.hostname.trim().is_empty() {
            return Err(RenderError::EmptyHostname(server.port));
        }
        if !seen.insert((server.hostname.as_str(), server.port)) {
            return Err(RenderError::DuplicateServer {
                hostname: server.hostname.clone(),
                port: server.port,
            });
        }
        for location in &server.locations {
            if !backends.contains(location.backend.as_str()) {
                return Err(RenderError::UnknownBackend {
                    hostname: server.hostname.clone(),
                    path: location.path.clone(),
                    backend: location.backend.clone(),
                });
            }
        }
    }
    Ok(())
}

fn render_server(out: &mut String, server: &Server) -> Result<(), RenderError> {
    writeln!(out)?;
    writeln!(out, "    server {{")?;
    writeln!(out, "        server_name {};", server.hostname)?;
    if server.tls.is_some() {
        writeln!(out, "        listen {} ssl;", server.port)?;
        writeln!(out, "        ssl_certificate_by_lua_block {{ certificate.call() }}")?;
    } else {
        writeln!(out, "        listen {};", server.port)?;
    }
    for location in &server.locations {
        writeln!(out, "        location {} {{", location.path)?;
        writeln!(out, "            set $proxy_upstream_name \"{}\";", location.backend)?;
        writeln!(out, "            proxy_pass http://upstream_balancer;")?;
        writeln!(out, "        }}")?;
    }
    writeln!(out, "    }}")?;
    Ok(())
}

fn render_l4(out: &mut String, service: &L4Service, udp: bool) -> Result<(), RenderError> {
    writeln!(out)?;
    writeln!(out, "    server {{")?;
    if udp {
        writeln!(out, "        listen {} udp;", service.port)?;
    } else {
        writeln!(out, "        listen {};", service.port)?;
    }
    if service.proxy_protocol {
        writeln!(out, "        proxy_protocol on;")?;
    }
    writeln!(out, "        set $proxy_upstream_name \"{}\";", service.backend)?;
    writeln!(out, "        proxy_pass upstream_balancer;")?;
    writeln!(out, "    }}")?;
    Ok(())
}
