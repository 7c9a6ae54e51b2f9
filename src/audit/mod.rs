//! Append-only structured audit log.
//!
//! Every event is serialized as one compact JSON object per line and appended
//! to a date-named file (`<dir>/<YYYYMMDD>_log.jsonl`) inside the configured
//! directory. The log is purely observational: producers hand events to a
//! cloneable [`AuditSink`] without waiting, and a single background task owns
//! the [`AuditWriter`] and is the only code touching the file.
//!
//! ```rust,no_run
//! use onion_gateway::audit::AuditSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, _handle) = AuditSink::start("/var/log/onion-gateway").await?;
//! sink.debug("gateway started");
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod sink;
pub mod writer;

pub use entry::{AuditEvent, AuditValue, Level, RequestSnapshot, UrlSnapshot};
pub use sink::AuditSink;
pub use writer::{AuditWriteError, AuditWriter};
