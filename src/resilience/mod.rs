//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Dynamic push to the proxy control surface:
//!     → attempt
//!     → on failure: backoff.rs computes the next delay (exponential + jitter)
//!     → retry until accepted or the attempt budget is spent
//! ```
//!
//! # Design Decisions
//! - Retries block the caller; no background retry tasks
//! - Every delay carries random jitter on top of the exponential base
//! - Attempt budget is explicit (retries + 1), never unbounded

pub mod backoff;

pub use backoff::Backoff;
