//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, stdout)
//!     → metrics.rs (request counters and latency histograms)
//!     → crate::audit (optional JSON-lines audit file)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log lines of a request (TraceLayer span)
//! - Metrics are cheap (atomic increments) and off unless an address is configured

pub mod logging;
pub mod metrics;
