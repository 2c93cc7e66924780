//! axum front mapping public requests onto the relay

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, warn};
use tunnel_control::{InboundRequest, Relay, RelayError};
use tunnel_proto::{HeaderMap, ResponseEnvelope};

/// Largest request body the front will buffer for the channel.
const BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum HttpServerError {
    #[error("Failed to bind HTTP listener: {0}")]
    BindError(std::io::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// State shared by every request handler.
pub struct AppState {
    pub relay: Relay,
}

/// Build the public router: every method and path lands in the relay.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().fallback(relay_handler).with_state(state)
}

/// The public HTTP listener.
pub struct HttpServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl HttpServer {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        state: Arc<AppState>,
    ) -> Result<Self, HttpServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(HttpServerError::BindError)?;
        info!(
            "HTTP server listening on {}",
            listener.local_addr().map_err(HttpServerError::IoError)?
        );
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HttpServerError> {
        self.listener.local_addr().map_err(HttpServerError::IoError)
    }

    pub async fn run(self) -> Result<(), HttpServerError> {
        axum::serve(self.listener, router(self.state))
            .await
            .map_err(HttpServerError::IoError)
    }
}

async fn relay_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let method = parts.method.to_string();
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let url = format!("http://{}{}", host, parts.uri);

    // Header names from the http crate are already lowercase; duplicate
    // names collapse to the last value, keeping keys unique on the wire.
    let mut headers = HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        headers.insert(
            name.as_str().to_string(),
            String::from_utf8_lossy(value.as_bytes()).into_owned(),
        );
    }

    let referrer = headers
        .get("referer")
        .cloned()
        .unwrap_or_else(|| "about:client".to_string());
    let referrer_policy = headers.get("referrer-policy").cloned().unwrap_or_default();

    let body = match to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return plain_response(StatusCode::BAD_REQUEST, "Bad request: unreadable body");
        }
    };

    let inbound = InboundRequest {
        method: method.clone(),
        url: url.clone(),
        headers,
        body,
        referrer,
        referrer_policy,
    };

    match state.relay.relay(inbound).await {
        Ok(envelope) => {
            trace(&method, &url, envelope.status, &envelope.status_text);
            envelope_response(envelope)
        }
        Err(err) => {
            let (status, message) = map_relay_error(&err);
            trace(
                &method,
                &url,
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
            );
            plain_response(status, message)
        }
    }
}

fn map_relay_error(err: &RelayError) -> (StatusCode, &'static str) {
    match err {
        RelayError::NoAgent => (
            StatusCode::NOT_IMPLEMENTED,
            "Service unavailable: Host is down in the overworld",
        ),
        RelayError::ChannelClosed => (
            StatusCode::BAD_GATEWAY,
            "Bad gateway: tunnel channel closed",
        ),
        RelayError::Timeout => (
            StatusCode::GATEWAY_TIMEOUT,
            "Gateway timeout: agent did not reply",
        ),
        RelayError::Codec(_) => (
            StatusCode::BAD_GATEWAY,
            "Bad gateway: tunnel protocol error",
        ),
    }
}

/// Turn a reply envelope into the public HTTP response.
fn envelope_response(envelope: ResponseEnvelope) -> Response {
    let status = match StatusCode::from_u16(envelope.status) {
        Ok(status) => status,
        Err(_) => {
            warn!(status = envelope.status, "Agent reply carried an invalid status");
            return plain_response(StatusCode::BAD_GATEWAY, "Bad gateway: tunnel protocol error");
        }
    };

    let mut response = Response::new(Body::from(envelope.body));
    *response.status_mut() = status;
    for (name, value) in &envelope.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

fn plain_response(status: StatusCode, body: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}

/// Per-request outcome line, success classified by status code.
fn trace(method: &str, url: &str, status: u16, status_text: &str) {
    if (200..400).contains(&status) {
        info!("[{}][{}] {} - {}", method, status, url, status_text);
    } else {
        warn!("[{}][{}] {} - {}", method, status, url, status_text);
    }
}
