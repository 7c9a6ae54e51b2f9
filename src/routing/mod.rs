//! Host-based routing subsystem.
//!
//! # Data Flow
//! ```text
//! Host header
//!     → host.rs (split host/port, classify against the public domain)
//!     → Index  : render the informational page
//!     → Proxy  : hand the request to the Director
//!     → Invalid: 400 error page
//! ```
//!
//! # Design Decisions
//! - Classification is exact (case-sensitive), same as the Director's suffix trimming
//! - The bare public domain never reaches the upstream

pub mod host;

pub use host::{
    is_explicit_port, join_host_port, request_host, split_host_port, strip_port, DomainMatcher, HostRoute,
};
