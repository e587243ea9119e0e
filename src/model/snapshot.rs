//! Configuration snapshots and their structural view.

use serde::{Deserialize, Serialize};

use crate::model::material::{DhParam, SslCert};
use crate::model::routing::{Backend, L4Service, Server};

/// One immutable desired-configuration value submitted for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Strictly increasing across snapshots accepted by one orchestrator.
    pub generation: i64,

    /// Opaque checksum of the upstream settings object.
    pub source_checksum: String,

    pub backends: Vec<Backend>,
    pub servers: Vec<Server>,
    pub tcp_services: Vec<L4Service>,
    pub udp_services: Vec<L4Service>,

    /// Certificate served when no server certificate matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_certificate: Option<SslCert>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dh_param: Option<DhParam>,
}

impl Snapshot {
    /// An empty snapshot at the given generation.
    pub fn empty(generation: i64) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    /// Parse a snapshot from its JSON representation.
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Routing-relevant subset used for diffing, fingerprinting and dynamic pushes.
    pub fn structural(&self) -> Configuration {
        Configuration {
            backends: self.backends.clone(),
            servers: self.servers.clone(),
            tcp_services: self.tcp_services.clone(),
            udp_services: self.udp_services.clone(),
        }
    }
}

/// Structural configuration: everything that affects routing, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Configuration {
    pub backends: Vec<Backend>,
    pub servers: Vec<Server>,
    pub tcp_services: Vec<L4Service>,
    pub udp_services: Vec<L4Service>,
}

impl Configuration {
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
            && self.servers.is_empty()
            && self.tcp_services.is_empty()
            && self.udp_services.is_empty()
    }
}
