//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! Snapshot → orchestrator.rs (lock, staleness check)
//!     → tls store (default certificate, DH parameters)
//!     → fingerprint.rs + differ.rs (what changed, can it go dynamic?)
//!     → full reload (render, dry run, write, signal) when required
//!     → dynamic push with retries
//!     → outcome.rs (returned to the caller, published to metrics/events)
//! ```
//!
//! # Design Decisions
//! - One reconciliation at a time; callers queue on the lock
//! - The fingerprint is for reporting; eligibility uses structural comparison
//! - Failures are values, never process aborts

pub mod differ;
pub mod fingerprint;
pub mod orchestrator;
pub mod outcome;

pub use differ::{is_dynamic_eligible, RemovedResources};
pub use fingerprint::Fingerprint;
pub use orchestrator::{ReconcileSettings, Reconciler, ReconcilerStatus};
pub use outcome::{OutcomeKind, OutcomeSummary, ReconcileError, ReconcileOutcome};
