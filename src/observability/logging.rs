//! Structured logging.
//!
//! Uses `tracing` with an `EnvFilter`: `RUST_LOG` wins, otherwise the level
//! follows the `debug` setting.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "onion_gateway=debug,tower_http=debug"
    } else {
        "onion_gateway=info,tower_http=info"
    }
}

/// Install the global tracing subscriber.
pub fn init(debug: bool) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug).into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if debug {
        tracing::debug!("DEBUG mode enabled");
    }
}
