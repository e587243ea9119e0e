//! Snapshot differ: dynamic-eligibility and removed resources.
//!
//! # Responsibilities
//! - Decide whether a change can be applied through the control surface
//! - List backends, hosts and certificates that disappeared (metric cleanup)
//!
//! # Design Decisions
//! - Pure functions over `Configuration`; no side effects
//! - Endpoints, weights and route tables may change freely
//! - Listener ports, certificate identities and L4 services require a reload

use std::collections::BTreeSet;
use serde::Serialize;

use crate::model::Configuration;

/// True when `new` can be applied to a proxy running `old` without a reload.
pub fn is_dynamic_eligible(old: &Configuration, new: &Configuration) -> bool {
    if listener_ports(old) != listener_ports(new) {
        tracing::debug!("Listener ports changed, reload required");
        return false;
    }
    if certificate_identities(old) != certificate_identities(new) {
        tracing::debug!("Certificate set changed, reload required");
        return false;
    }
    if old.tcp_services != new.tcp_services || old.udp_services != new.udp_services {
        tracing::debug!("Passthrough services changed, reload required");
        return false;
    }
    true
}

/// Every port a listen socket is opened for.
pub fn listener_ports(config: &Configuration) -> BTreeSet<u16> {
    config
        .servers
        .iter()
        .map(|s| s.port)
        .chain(config.tcp_services.iter().map(|s| s.port))
        .chain(config.udp_services.iter().map(|s| s.port))
        .collect()
}

/// Content identities of every server certificate in use.
pub fn certificate_identities(config: &Configuration) -> BTreeSet<String> {
    config
        .servers
        .iter()
        .filter_map(|s| s.tls.as_ref())
        .map(|cert| cert.identity())
        .collect()
}

/// Resources present in the previous configuration but gone from the new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemovedResources {
    pub backends: Vec<String>,
    pub hosts: Vec<String>,
    pub certificates: Vec<String>,
}

impl RemovedResources {
    pub fn between(old: &Configuration, new: &Configuration) -> Self {
        Self {
            backends: removed_backends(old, new),
            hosts: removed_hosts(old, new),
            certificates: removed_certificates(old, new),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty() && self.hosts.is_empty() && self.certificates.is_empty()
    }
}

pub fn removed_backends(old: &Configuration, new: &Configuration) -> Vec<String> {
    let kept: BTreeSet<&str> = new.backends.iter().map(|b| b.name.as_str()).collect();
    difference(old.backends.iter().map(|b| b.name.clone()), |name| kept.contains(name))
}

pub fn removed_hosts(old: &Configuration, new: &Configuration) -> Vec<String> {
    let kept: BTreeSet<&str> = new.servers.iter().map(|s| s.hostname.as_str()).collect();
    difference(old.servers.iter().map(|s| s.hostname.clone()), |host| kept.contains(host))
}

/// Removed certificates, by tracking id (serial number or identity).
pub fn removed_certificates(old: &Configuration, new: &Configuration) -> Vec<String> {
    let kept: BTreeSet<String> = new
        .servers
        .iter()
        .filter_map(|s| s.tls.as_ref())
        .map(|c| c.tracking_id())
        .collect();
    difference(
        old.servers.iter().filter_map(|s| s.tls.as_ref()).map(|c| c.tracking_id()),
        |id| kept.contains(id),
    )
}

fn difference(items: impl Iterator<Item = String>, kept: impl Fn(&str) -> bool) -> Vec<String> {
    items
        .filter(|item| !kept(item.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
