//! Ingress reload orchestrator.
//!
//! Applies desired-configuration snapshots to a running proxy, choosing between
//! a dynamic in-memory update and a full validated reload.

pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod proxy;
pub mod reconcile;
pub mod resilience;
pub mod tls;

pub use config::ControllerConfig;
pub use lifecycle::Shutdown;
pub use model::Snapshot;
pub use reconcile::{ReconcileOutcome, Reconciler};
