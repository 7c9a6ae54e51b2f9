//! Upstream transport: one HTTP client tunnelled through the SOCKS proxy.
//!
//! # Design Decisions
//! - TLS certificates are not verified; the onion address authenticates the service
//! - Redirects are returned to the client (after header rewriting), never followed
//! - Bodies are not decompressed by the client so gzip reaches the rewriter intact

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::error::GatewayError;
use crate::http::headers::end_to_end;

/// Build the process-wide upstream client.
pub fn build_client(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<reqwest::Client, reqwest::Error> {
    let timeout = Duration::from_secs(timeouts.request_secs);

    reqwest::Client::builder()
        .proxy(reqwest::Proxy::all(upstream.proxy_url.as_str())?)
        .danger_accept_invalid_certs(true)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
}

/// Send an already-directed request upstream and convert the answer into a
/// streaming response.
pub async fn forward(
    client: &reqwest::Client,
    request: Request<Body>,
    max_body_bytes: usize,
) -> Result<Response<Body>, GatewayError> {
    let (parts, body) = request.into_parts();

    let url = reqwest::Url::parse(&parts.uri.to_string())
        .map_err(|e| GatewayError::RequestBuild(format!("{}: {}", parts.uri, e)))?;
    let body = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(|e| GatewayError::RequestBody(e.to_string()))?;

    let mut upstream = client
        .request(parts.method, url)
        .headers(end_to_end(&parts.headers));
    if !body.is_empty() {
        upstream = upstream.body(body);
    }
    let upstream = upstream.send().await?;

    let status = upstream.status();
    let headers = end_to_end(upstream.headers());

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
