//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → CLI flags / environment (cli.rs)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable for the process lifetime)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults; only the domain is mandatory
//! - Validation separates syntactic (serde) from semantic checks

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::{load_config, ConfigError};
pub use schema::{AuditConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, TimeoutConfig, UpstreamConfig};
