//! Request/response rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Client request (sub.public.example)
//!     → director.rs (public host → sub.onion, scheme, X-Forwarded-For scrub)
//!     → [upstream transport over SOCKS]
//!     → response.rs (headers, content-type gate, gzip, body substitution)
//!     → Client response
//! ```
//!
//! # Design Decisions
//! - Both stages are stateless; the only shared input is `RewriteConfig`
//! - Body substitution is delimiter bounded (`.onion/`, `.onion"`, `.onion<`)
//! - Errors are returned to the caller, never swallowed

pub mod content_type;
pub mod director;
pub mod gzip;
pub mod response;
pub mod sanitize;

pub use director::Director;
pub use response::{ResponseRewriter, RewriteError};

/// Suffix carried by every internal address.
pub const ONION_SUFFIX: &str = ".onion";

/// Static rewrite configuration shared by the Director and ResponseRewriter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteConfig {
    /// Public domain suffix, always starting with `.`.
    domain: String,
}

impl RewriteConfig {
    /// Create a config from a public domain, normalizing it to a leading-dot form.
    pub fn new(domain: impl AsRef<str>) -> Self {
        Self {
            domain: normalize_domain(domain.as_ref()),
        }
    }

    /// The public domain suffix (e.g. `.example.org`).
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The public domain without its leading dot (e.g. `example.org`).
    pub fn bare_domain(&self) -> &str {
        &self.domain[1..]
    }
}

/// Prefix `domain` with a `.` unless it already has one.
pub fn normalize_domain(domain: &str) -> String {
    if domain.starts_with('.') {
        domain.to_string()
    } else {
        format!(".{}", domain)
    }
}
