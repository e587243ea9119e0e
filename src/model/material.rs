//! TLS material carried by snapshots.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A PEM certificate (chain plus key) with optional tracking metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslCert {
    /// Logical name; determines the on-disk file name.
    #[serde(default)]
    pub name: String,

    /// PEM bytes (certificate chain followed by the private key).
    pub pem: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,

    /// Expiry as unix seconds, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl SslCert {
    pub fn new(name: impl Into<String>, pem: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pem: pem.into(),
            serial_number: None,
            expires_at: None,
        }
    }

    /// Content identity: hex SHA-256 of the PEM bytes.
    pub fn identity(&self) -> String {
        content_identity(self.pem.as_bytes())
    }

    /// Id used to track the certificate across snapshots.
    pub fn tracking_id(&self) -> String {
        match &self.serial_number {
            Some(serial) if !serial.is_empty() => serial.clone(),
            _ => self.identity(),
        }
    }
}

/// Diffie-Hellman parameters referenced by the rendered configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhParam {
    pub name: String,
    pub content: String,
}

/// Hex SHA-256 of arbitrary bytes.
pub fn content_identity(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
