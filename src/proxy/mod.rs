//! Proxy control subsystem.
//!
//! # Data Flow
//! ```text
//! Full reload path:
//!     Snapshot → template.rs (render artifact)
//!     → process.rs (dry run on a temp copy)
//!     → live artifact replaced → process.rs (graceful reload)
//!
//! Dynamic path:
//!     Configuration (new, old) → pusher.rs (retry + backoff)
//!     → dynamic.rs (POST to the local control surface)
//! ```
//!
//! # Design Decisions
//! - Process control and control surface are traits so the orchestrator can be
//!   driven against fakes
//! - The live process is never used for validation
//! - Reload is graceful; the previous workers keep serving until it succeeds

pub mod dynamic;
pub mod process;
pub mod pusher;
pub mod template;

pub use dynamic::{DynamicConfigurator, DynamicError, HttpConfigurator};
pub use process::{NginxProcess, ProxyError, ProxyProcess};
pub use pusher::DynamicPusher;
pub use template::{ConfigRenderer, NginxRenderer, RenderContext, RenderError};
