//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! SIGTERM/SIGINT (shutdown.rs::wait_for_signal)
//!     → Shutdown::trigger (broadcast)
//!     → HttpServer stops accepting, drains in-flight requests
//!     → forced exit once the grace period elapses
//! ```

pub mod shutdown;

pub use shutdown::{wait_for_signal, Shutdown};
