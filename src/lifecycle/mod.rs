//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast to long-running tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Re-read the snapshot file and reconcile it
//! ```
//!
//! # Design Decisions
//! - A reconciliation in progress finishes before the loop observes shutdown
//! - SIGHUP never shuts down; it only forces a fresh read of desired state

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{SignalEvent, Signals};
