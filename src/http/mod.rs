//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, timeout)
//!     → middleware/forwarded.rs (fold X-Forwarded-* into the request)
//!     → routing::DomainMatcher (index / proxy / invalid)
//!     → rewrite::Director (public host → .onion)
//!     → upstream.rs (SOCKS client, hop-by-hop headers dropped)
//!     → rewrite::ResponseRewriter (.onion → public domain)
//!     → Send to client
//! ```

pub mod headers;
pub mod middleware;
pub mod pages;
pub mod request;
pub mod server;
pub mod upstream;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
