//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create the Axum router; every path and method goes to one handler
//! - Wire up middleware (request id, tracing, timeout, forwarded headers)
//! - Classify the Host, answer the index page or reject foreign domains
//! - Direct, forward over SOCKS and rewrite the response
//! - Serve until shutdown, then drain in-flight requests for a bounded time
//!
//! # Design Decisions
//! - One `reqwest::Client` for the process; connections to the proxy are pooled
//! - Every failure becomes a `GatewayError`, logged once and rendered as the error page

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Uri},
    response::{Html, IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::audit::{AuditSink, Level, RequestSnapshot};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::middleware::forwarded_headers;
use crate::http::request::{request_id_header, request_id_of, UuidRequestId, X_REQUEST_ID};
use crate::http::{pages, upstream};
use crate::observability::metrics;
use crate::rewrite::sanitize::sanitize;
use crate::rewrite::{Director, ResponseRewriter, RewriteConfig};
use crate::routing::{request_host, strip_port, DomainMatcher, HostRoute};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub matcher: Arc<DomainMatcher>,
    pub director: Arc<Director>,
    pub rewriter: Arc<ResponseRewriter>,
    pub client: reqwest::Client,
    pub audit: Option<AuditSink>,
    pub max_request_body_bytes: usize,
    /// Deadline for directing, forwarding and rewriting one request.
    pub request_timeout: Duration,
}

/// Headroom of the outer `TimeoutLayer` over `request_timeout`, so an
/// upstream deadline is always answered by the handler's 502 page.
const TIMEOUT_LAYER_MARGIN_SECS: u64 = 5;

impl AppState {
    /// Build the shared state from a validated config.
    pub fn new(config: &GatewayConfig, audit: Option<AuditSink>) -> Result<Self, reqwest::Error> {
        let rewrite = RewriteConfig::new(&config.domain);
        let client = upstream::build_client(&config.upstream, &config.timeouts)?;

        Ok(Self {
            matcher: Arc::new(DomainMatcher::new(rewrite.clone())),
            director: Arc::new(Director::new(rewrite.clone()).with_audit(audit.clone())),
            rewriter: Arc::new(ResponseRewriter::new(rewrite).with_audit(audit.clone())),
            client,
            audit,
            max_request_body_bytes: config.upstream.max_request_body_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        })
    }

    /// Log `err` to tracing and the audit log, count it, and render it.
    fn fail(&self, request_id: &str, method: &str, start: Instant, err: GatewayError) -> Response {
        let status = err.status_code();
        let message = sanitize(&err.to_string());

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, status = %status, error = %message, "request failed");
        } else {
            tracing::warn!(request_id = %request_id, status = %status, error = %message, "request rejected");
        }
        if let Some(audit) = &self.audit {
            audit.error(message);
        }

        metrics::record_request(method, status.as_u16(), "error", start);
        err.into_response()
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Fails only when the upstream client cannot be built (bad proxy URL).
    pub fn new(config: GatewayConfig, audit: Option<AuditSink>) -> Result<Self, reqwest::Error> {
        let state = AppState::new(&config, audit)?;
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let request_id = request_id_header();

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(axum::middleware::from_fn(forwarded_headers))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs + TIMEOUT_LAYER_MARGIN_SECS,
            )))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request_id_of(req),
                    method = %req.method(),
                    uri = %sanitize(&req.uri().to_string()),
                )
            }))
            .layer(SetRequestIdLayer::new(request_id, UuidRequestId))
    }

    /// A clone of the fully layered router, for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain for at most
    /// `graceful_shutdown_secs` before dropping open connections.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            domain = %self.config.domain,
            proxy = %self.config.upstream.proxy_url,
            "HTTP server starting"
        );

        let grace = Duration::from_secs(self.config.timeouts.graceful_shutdown_secs);
        let mut deadline = shutdown.resubscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutting down, draining in-flight requests");
            })
            .into_future();

        tokio::select! {
            result = serve => result?,
            _ = async {
                let _ = deadline.recv().await;
                tokio::time::sleep(grace).await;
            } => {
                tracing::warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out, closing open connections");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Classifies the host, then directs, forwards and rewrites the request.
async fn proxy_handler(State(state): State<AppState>, mut request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id_of(&request);
    let method = request.method().to_string();

    let host = match request_host(&request) {
        Some(host) => host,
        None => return state.fail(&request_id, &method, start, GatewayError::MissingHost),
    };

    match state.matcher.classify(&host) {
        HostRoute::Index => {
            return match pages::render(None) {
                Ok(page) => {
                    metrics::record_request(&method, 200, "index", start);
                    Html(page).into_response()
                }
                Err(e) => state.fail(&request_id, &method, start, GatewayError::Render(e)),
            };
        }
        HostRoute::Invalid => {
            let err = GatewayError::InvalidDomain {
                host: sanitize(strip_port(&host)),
                domain: state.matcher.domain().to_string(),
            };
            return state.fail(&request_id, &method, start, err);
        }
        HostRoute::Proxy => {}
    }

    tracing::debug!(
        request_id = %request_id,
        host = %sanitize(&host),
        path = %sanitize(request.uri().path()),
        "sending request"
    );
    if let Some(audit) = &state.audit {
        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        audit.request(RequestSnapshot::capture(Level::Debug, "sending request", &request, remote));
    }

    // The id stays between the client and the gateway.
    request.headers_mut().remove(X_REQUEST_ID);

    let proxied = tokio::time::timeout(state.request_timeout, proxy_upstream(&state, request)).await;
    let (response, upstream_url) = match proxied {
        Ok(Ok(proxied)) => proxied,
        Ok(Err(e)) => return state.fail(&request_id, &method, start, e),
        Err(_) => {
            let err = GatewayError::UpstreamTimeout {
                secs: state.request_timeout.as_secs(),
            };
            return state.fail(&request_id, &method, start, err);
        }
    };

    tracing::debug!(
        request_id = %request_id,
        upstream = %sanitize(&upstream_url.to_string()),
        status = %response.status(),
        "request proxied"
    );
    metrics::record_request(&method, response.status().as_u16(), "proxied", start);
    response
}

/// Direct `request` at the hidden service, send it and rewrite the answer.
async fn proxy_upstream(state: &AppState, mut request: Request<Body>) -> Result<(Response, Uri), GatewayError> {
    state.director.direct(&mut request)?;
    let upstream_url = request.uri().clone();

    let mut response = upstream::forward(&state.client, request, state.max_request_body_bytes).await?;
    state.rewriter.rewrite(&mut response, &upstream_url).await?;
    Ok((response, upstream_url))
}
