//! Host header parsing and public-domain classification.

use axum::http::header::HOST;
use axum::http::Request;

use crate::rewrite::RewriteConfig;

/// The target host of `req`: the `Host` header, else the URI authority (HTTP/2).
pub fn request_host<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(HOST)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .or_else(|| req.uri().authority().map(|a| a.to_string()))
}

/// Split `host:port` or `[v6]:port` into its parts.
///
/// Returns `None` when no port is present or the value is malformed
/// (for example an unbracketed IPv6 literal).
pub fn split_host_port(hostport: &str) -> Option<(&str, &str)> {
    if let Some(rest) = hostport.strip_prefix('[') {
        let end = rest.find(']')?;
        let port = rest[end + 1..].strip_prefix(':')?;
        return Some((&rest[..end], port));
    }

    let idx = hostport.rfind(':')?;
    let host = &hostport[..idx];
    if host.contains(':') {
        return None;
    }
    Some((host, &hostport[idx + 1..]))
}

/// Join host and port, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Whether `port` should be spelled out in a host (anything but empty, 80 and 443).
pub fn is_explicit_port(port: &str) -> bool {
    !port.is_empty() && port != "80" && port != "443"
}

/// Strip an optional port from a host header value.
pub fn strip_port(hostport: &str) -> &str {
    split_host_port(hostport)
        .map(|(host, _)| host)
        .unwrap_or(hostport)
}

/// Where a request for a given host should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRoute {
    /// The bare public domain; answered with the informational page.
    Index,
    /// A subdomain of the public domain; proxied to `<sub>.onion`.
    Proxy,
    /// Anything outside the public domain.
    Invalid,
}

/// Classifies host header values against the configured public domain.
#[derive(Debug, Clone)]
pub struct DomainMatcher {
    config: RewriteConfig,
}

impl DomainMatcher {
    pub fn new(config: RewriteConfig) -> Self {
        Self { config }
    }

    /// Classify a host header value (port allowed).
    pub fn classify(&self, host_header: &str) -> HostRoute {
        let host = strip_port(host_header);
        if host == self.config.bare_domain() {
            HostRoute::Index
        } else if host.ends_with(self.config.domain()) {
            HostRoute::Proxy
        } else {
            HostRoute::Invalid
        }
    }

    /// The public domain suffix used for matching.
    pub fn domain(&self) -> &str {
        self.config.domain()
    }
}
