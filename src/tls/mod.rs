//! TLS material management.
//!
//! # Data Flow
//! ```text
//! Snapshot.default_certificate / Snapshot.dh_param
//!     → store.rs (identity check against disk)
//!     → fs.rs (temp file + rename, mode 0600)
//!     → path referenced by the rendered artifact
//! ```

pub mod fs;
pub mod store;

pub use store::{CertificateStore, StoreError, StoredFile, FAKE_CERTIFICATE_NAME};
