//! On-disk TLS material: default certificate and Diffie-Hellman parameters.
//!
//! # Responsibilities
//! - Map logical names to files under the SSL directory
//! - Skip writes whose content identity matches the file already on disk
//! - Write atomically with owner-only permissions
//!
//! # Design Decisions
//! - Identity is recomputed from disk, so an externally modified file is repaired
//! - Callers hold the reconcile lock; the store itself does no locking

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::material::content_identity;
use crate::tls::fs::write_atomic;

/// File name used for an unnamed default certificate.
pub const FAKE_CERTIFICATE_NAME: &str = "default-fake-certificate";

/// Errors raised while persisting TLS material.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid file name '{0}'")]
    InvalidName(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of a store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    /// True when the file content was (re)written.
    pub changed: bool,
}

/// Owner of the TLS files under one directory.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    ssl_dir: PathBuf,
}

impl CertificateStore {
    pub fn new(ssl_dir: impl Into<PathBuf>) -> Self {
        Self {
            ssl_dir: ssl_dir.into(),
        }
    }

    /// Path of the PEM file for a certificate name (placeholder name when empty).
    pub fn certificate_path(&self, name: &str) -> PathBuf {
        let name = if name.is_empty() { FAKE_CERTIFICATE_NAME } else { name };
        self.ssl_dir.join(format!("{}.pem", name))
    }

    /// Path of the DH parameter file for a name.
    pub fn dh_param_path(&self, name: &str) -> PathBuf {
        self.ssl_dir.join(format!("{}.pem", name))
    }

    /// Write a certificate unless the same content is already on disk.
    pub fn store_if_changed(&self, name: &str, content: &[u8]) -> Result<StoredFile, StoreError> {
        if !name.is_empty() {
            check_name(name)?;
        }
        let path = self.certificate_path(name);
        let changed = write_if_changed(&path, content)?;
        if changed {
            tracing::info!(name = %name, path = ?path, "Stored certificate");
        } else {
            tracing::debug!(name = %name, "Certificate unchanged on disk, skipping write");
        }
        Ok(StoredFile { path, changed })
    }

    /// Write DH parameters unless the same content is already on disk.
    pub fn store_dh_param_if_changed(&self, name: &str, content: &[u8]) -> Result<StoredFile, StoreError> {
        check_name(name)?;
        let path = self.dh_param_path(name);
        let changed = write_if_changed(&path, content)?;
        if changed {
            tracing::info!(path = ?path, "Stored DH parameters");
        }
        Ok(StoredFile { path, changed })
    }
}

fn check_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool, StoreError> {
    let wanted = content_identity(content);
    match fs::read(path) {
        Ok(existing) if content_identity(&existing) == wanted => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    write_atomic(path, content).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}
