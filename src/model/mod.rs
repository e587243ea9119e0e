//! Desired-state data model.
//!
//! # Data Flow
//! ```text
//! snapshot source (file watcher, tests)
//!     → Snapshot (immutable, fully resolved)
//!     → Configuration (structural subset: backends, servers, L4 services)
//!     → differ / fingerprint / renderer / dynamic pusher
//! ```
//!
//! # Design Decisions
//! - Snapshots are plain values; the orchestrator owns the last-applied one
//! - Cosmetic and bookkeeping fields stay on `Snapshot`, never on `Configuration`
//! - TLS material carries its PEM bytes so no lookups happen during reconciliation

pub mod material;
pub mod routing;
pub mod snapshot;

pub use material::{DhParam, SslCert};
pub use routing::{Backend, Endpoint, L4Service, Location, Server};
pub use snapshot::{Configuration, Snapshot};
