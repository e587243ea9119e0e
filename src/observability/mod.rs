//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Reconciliation produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (reload counters, config hash, per-host gauges)
//!     → events.rs (Normal/Warning "RELOAD" messages)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → External event sink (channel)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics and events sit behind traits so tests can record them

pub mod events;
pub mod logging;
pub mod metrics;

pub use events::{ChannelEventSink, Event, EventKind, EventSink, LogEventSink};
pub use metrics::{MetricsCollector, NoopMetrics, PrometheusMetrics};
