//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ControllerConfig (validated, immutable)
//!
//! Desired state:
//!     watcher.rs detects snapshot file change
//!     → parses JSON snapshot
//!     → sends it to the reconcile loop over a channel
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::ControllerConfig;
pub use schema::ReconcileConfig;
pub use loader::{load_config, ConfigError};
