//! Onion gateway library: exposes `<sub>.onion` hidden services under
//! `<sub>.<public domain>` through a SOCKS proxy.

pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
