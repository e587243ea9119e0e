//! Routing-relevant descriptors: backends, virtual servers and L4 passthrough services.

use serde::{Deserialize, Serialize};

use crate::model::material::SslCert;

/// A backend service and its resolved endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    /// Unique backend name, referenced by locations.
    pub name: String,

    /// Resolved endpoints; membership may change without a reload.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    /// Load-balancing hint (e.g. "round_robin", "ewma").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balance: Option<String>,
}

/// A single upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,

    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            weight: default_weight(),
        }
    }
}

/// A virtual server: hostname, listener port, route table and optional TLS material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub hostname: String,

    /// Listener port this server is bound to.
    pub port: u16,

    /// Certificate served for this hostname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<SslCert>,

    /// Route table, matched by path prefix.
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// One entry of a server's route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub backend: String,
}

/// A TCP or UDP passthrough service bound to its own listener port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L4Service {
    pub port: u16,

    /// Name of the service the traffic is forwarded to.
    pub backend: String,

    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(default)]
    pub proxy_protocol: bool,
}
