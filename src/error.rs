//! Gateway error taxonomy and its mapping onto HTTP responses.

use axum::http::header::CONNECTION;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::http::pages;
use crate::rewrite::director::DirectorError;
use crate::rewrite::RewriteError;

/// Errors surfaced while serving a single request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Host outside the public domain.
    #[error("invalid domain {host} called. The domain needs to end in {domain}")]
    InvalidDomain { host: String, domain: String },

    /// Neither a `Host` header nor a URI authority was present.
    #[error("request carries no host")]
    MissingHost,

    #[error("could not read request body: {0}")]
    RequestBody(String),

    #[error(transparent)]
    Director(#[from] DirectorError),

    #[error("could not build upstream request: {0}")]
    RequestBuild(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream did not answer within {secs}s")]
    UpstreamTimeout { secs: u64 },

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error("could not render page: {0}")]
    Render(#[from] std::fmt::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidDomain { .. } => StatusCode::BAD_REQUEST,
            GatewayError::MissingHost => StatusCode::BAD_REQUEST,
            GatewayError::RequestBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::Director(_) => StatusCode::BAD_REQUEST,
            GatewayError::RequestBuild(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Rewrite(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match pages::render(Some(&self.to_string())) {
            Ok(page) => (status, [(CONNECTION, "close")], Html(page)).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "could not render error page");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
