//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// Proxy schemes the upstream client can tunnel through.
const PROXY_SCHEMES: &[&str] = &["socks5", "socks5h", "http", "https"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please provide a domain")]
    MissingDomain,

    #[error("invalid proxy url {url}: {reason}")]
    InvalidProxyUrl { url: String, reason: String },

    #[error("invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("invalid metrics address {0}")]
    InvalidMetricsAddress(String),

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.domain.trim_start_matches('.').is_empty() {
        errors.push(ValidationError::MissingDomain);
    }

    match url::Url::parse(&config.upstream.proxy_url) {
        Ok(url) if !PROXY_SCHEMES.contains(&url.scheme()) => {
            errors.push(ValidationError::InvalidProxyUrl {
                url: config.upstream.proxy_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidProxyUrl {
            url: config.upstream.proxy_url.clone(),
            reason: e.to_string(),
        }),
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
