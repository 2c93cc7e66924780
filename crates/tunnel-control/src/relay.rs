//! Request relay
//!
//! Per-HTTP-request entry point: consult the registry, forward an envelope
//! on the active agent channel, and suspend until the matching reply
//! arrives, the connection goes away, or the reply deadline passes.

use crate::registry::ConnectionRegistry;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tunnel_proto::{self as proto, HeaderMap, ProtoError, RequestEnvelope, ResponseEnvelope};
use uuid::Uuid;

/// Relay failures, distinguished so the HTTP front can map them to
/// different status codes.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no agent connection is active")]
    NoAgent,

    #[error("agent channel closed before a reply arrived")]
    ChannelClosed,

    #[error("agent did not reply within the deadline")]
    Timeout,

    #[error(transparent)]
    Codec(#[from] ProtoError),
}

/// An inbound public HTTP request, reduced to what the envelope carries.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
    pub referrer: String,
    pub referrer_policy: String,
}

/// The request/response relay engine.
pub struct Relay {
    registry: Arc<ConnectionRegistry>,
    reply_timeout: Duration,
}

impl Relay {
    pub fn new(registry: Arc<ConnectionRegistry>, reply_timeout: Duration) -> Self {
        Self {
            registry,
            reply_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Forward one request and wait for its reply.
    ///
    /// The waiter is registered against the exact connection snapshot the
    /// envelope is sent on, so an eviction racing this call still fails the
    /// right table entry.
    pub async fn relay(&self, inbound: InboundRequest) -> Result<ResponseEnvelope, RelayError> {
        let conn = self.registry.current().ok_or(RelayError::NoAgent)?;

        let correlation_id = Uuid::new_v4();
        let envelope = RequestEnvelope {
            body: inbound.body,
            headers: inbound.headers,
            method: inbound.method,
            referrer: inbound.referrer,
            referrer_policy: inbound.referrer_policy,
            credentials: "same-origin".to_string(),
            destination: String::new(),
            url: inbound.url,
            correlation_id,
        };
        let frame = proto::encode(&envelope)?;

        tracing::debug!(
            %correlation_id,
            connection_id = %conn.id(),
            method = %envelope.method,
            url = %envelope.url,
            "Forwarding request to agent"
        );

        // Register before sending so a reply can never race the waiter.
        let waiter = conn.pending().register(correlation_id);
        if conn.send_text(frame).is_err() {
            conn.pending().forget(correlation_id);
            return Err(RelayError::ChannelClosed);
        }

        match tokio::time::timeout(self.reply_timeout, waiter).await {
            Ok(Ok(reply)) => Ok(reply),
            // Sender dropped: the connection was evicted or closed.
            Ok(Err(_)) => Err(RelayError::ChannelClosed),
            Err(_) => {
                conn.pending().forget(correlation_id);
                tracing::warn!(%correlation_id, "Agent reply timed out");
                Err(RelayError::Timeout)
            }
        }
    }
}
