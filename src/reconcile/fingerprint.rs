//! Structural fingerprint of a configuration.

use std::fmt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::Configuration;

/// Deterministic, order-sensitive hash of the structural configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Fingerprint of a structural configuration.
    pub fn of(config: &Configuration) -> Self {
        let mut hasher = Sha256::new();
        // Serializing plain structs and vectors cannot fail.
        if let Err(e) = serde_json::to_writer(HashWriter(&mut hasher), config) {
            tracing::error!(error = %e, "Failed to serialize configuration for fingerprint");
        }
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Fingerprint(u64::from_be_bytes(head))
    }

    /// Value reported to the metrics gauge.
    pub fn as_gauge(&self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct HashWriter<'a>(&'a mut Sha256);

impl std::io::Write for HashWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
