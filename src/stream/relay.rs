//! Header-injecting streaming relay
//!
//! A loopback HTTP server that replays a request to a media host with the
//! headers it insists on (Referer, User-Agent, cookies), so players that
//! can't set headers can still open the stream. The target and headers travel
//! in the URL as `?data=base64(json)`; the relay itself is stateless.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::TryStreamExt;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::fetch::USER_AGENT;
use crate::models::{Headers, RelayDecodeError, RelayRequest};

/// Body chunk size when streaming upstream bytes
pub const CHUNK_SIZE: usize = 8192;

/// Lower bound for the upstream response timeout
pub const MIN_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Request headers never forwarded upstream
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "transfer-encoding",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "upgrade",
    "upgrade-insecure-requests",
    // Bodies are passed through untouched, so no compression negotiation
    "accept-encoding",
    "content-length",
];

/// Upstream response headers copied back to the client
pub const FORWARDED_RESPONSE_HEADERS: &[HeaderName] = &[
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::CONTENT_RANGE,
    header::LAST_MODIFIED,
    header::ETAG,
];

/// Relay failures, each mapped to an HTTP status
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("missing data parameter")]
    MissingData,

    #[error(transparent)]
    Decode(#[from] RelayDecodeError),

    #[error("invalid header: {0}")]
    BadHeader(String),

    #[error("refusing to relay to the relay itself: {0}")]
    SelfTarget(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    #[error("failed to bind relay: {0}")]
    Bind(#[from] std::io::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingData
            | RelayError::Decode(_)
            | RelayError::BadHeader(_)
            | RelayError::SelfTarget(_) => StatusCode::BAD_REQUEST,
            RelayError::Upstream(_) | RelayError::Timeout(_) | RelayError::Bind(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "relay upstream error");
        } else {
            debug!(error = %self, "rejected relay request");
        }
        let mut response = (status, self.to_string()).into_response();
        add_cors(response.headers_mut());
        response
    }
}

#[derive(Clone)]
struct RelayState {
    client: reqwest::Client,
    timeout: Duration,
    addr: SocketAddr,
}

#[derive(Debug, Deserialize)]
struct StreamParams {
    data: Option<String>,
}

fn add_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
}

/// True if `url` points back at the relay listening on `addr`
pub fn targets_relay(url: &str, addr: SocketAddr) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let loopback = match parsed.host() {
        Some(url::Host::Domain(d)) => d.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback() || ip.is_unspecified(),
        None => false,
    };
    loopback && parsed.port_or_known_default() == Some(addr.port())
}

/// Inbound request headers minus hop-by-hop ones, overlaid with the
/// relay request's headers (which win on conflict)
pub fn merge_headers(inbound: &HeaderMap, required: &Headers) -> Result<HeaderMap, RelayError> {
    // Headers named in Connection are hop-by-hop too
    let connection_listed: HashSet<String> = inbound
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    let mut merged = HeaderMap::new();
    for (name, value) in inbound {
        let lower = name.as_str();
        if HOP_BY_HOP_HEADERS.contains(&lower) || connection_listed.contains(lower) {
            continue;
        }
        merged.append(name.clone(), value.clone());
    }

    for (name, value) in required {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| RelayError::BadHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| RelayError::BadHeader(name.clone()))?;
        merged.insert(header_name, header_value);
    }

    if !merged.contains_key(header::USER_AGENT) {
        merged.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
    }
    Ok(merged)
}

async fn preflight() -> Response {
    let mut response = StatusCode::OK.into_response();
    add_cors(response.headers_mut());
    response
}

async fn fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        return preflight().await;
    }
    let mut response = (StatusCode::NOT_FOUND, "not found").into_response();
    add_cors(response.headers_mut());
    response
}

async fn relay_stream(
    State(state): State<RelayState>,
    Query(params): Query<StreamParams>,
    inbound: HeaderMap,
) -> Result<Response, RelayError> {
    let data = params.data.ok_or(RelayError::MissingData)?;
    let request = RelayRequest::decode(&data)?;

    if targets_relay(&request.target_url, state.addr) {
        return Err(RelayError::SelfTarget(request.target_url));
    }

    let headers = merge_headers(&inbound, &request.headers)?;
    debug!(target = %request.target_url, range = ?inbound.get(header::RANGE), "relaying");

    let upstream = tokio::time::timeout(
        state.timeout,
        state.client.get(&request.target_url).headers(headers).send(),
    )
    .await
    .map_err(|_| RelayError::Timeout(state.timeout))??;

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for name in FORWARDED_RESPONSE_HEADERS {
        if let Some(value) = upstream.headers().get(name) {
            response_headers.insert(name.clone(), value.clone());
        }
    }
    add_cors(&mut response_headers);

    // Errors after this point just end the body; the status is already sent
    let bytes = upstream.bytes_stream().map_err(std::io::Error::other);
    let body = Body::from_stream(ReaderStream::with_capacity(
        StreamReader::new(bytes),
        CHUNK_SIZE,
    ));

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

fn router(state: RelayState) -> Router {
    Router::new()
        .route("/stream", get(relay_stream).options(preflight))
        .fallback(fallback)
        .with_state(state)
}

/// Running relay. Dropping the handle stops the server.
pub struct RelayHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://127.0.0.1:{port}`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// True if `url` is one of this relay's URLs
    pub fn is_relay_url(&self, url: &str) -> bool {
        targets_relay(url, self.addr)
    }

    /// Proxy URL for a request. A target that already goes through this
    /// relay is returned unchanged instead of being wrapped again.
    pub fn proxy_url(&self, request: &RelayRequest) -> String {
        if self.is_relay_url(&request.target_url) {
            return request.target_url.clone();
        }
        format!(
            "{}/stream?data={}",
            self.base_url(),
            urlencoding::encode(&request.encode())
        )
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Wait until the server stops (Ctrl-C handling is up to the caller)
    pub async fn wait(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start the relay on `127.0.0.1:{port}` (`0` picks a free port)
pub async fn start_relay(port: u16, timeout: Duration) -> Result<RelayHandle, RelayError> {
    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)).await?;
    let addr = listener.local_addr()?;
    let timeout = timeout.max(MIN_UPSTREAM_TIMEOUT);

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .build()?;
    let app = router(RelayState {
        client,
        timeout,
        addr,
    });

    let (tx, rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = rx.await;
    });
    let task = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!(error = %e, "relay server stopped");
        }
    });

    info!(addr = %addr, "relay listening");
    Ok(RelayHandle {
        addr,
        shutdown: Some(tx),
        task: Some(task),
    })
}
