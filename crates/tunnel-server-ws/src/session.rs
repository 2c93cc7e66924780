//! Per-connection session loop
//!
//! The first text frame on a fresh socket is the auth message; everything
//! after a successful auth is a reply envelope routed by correlation id.
//! Rejected connections never touch the registry.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};
use tunnel_auth::TokenValidator;
use tunnel_control::{AgentConnection, ConnectionRegistry, OutboundFrame};
use tunnel_proto::{self as proto, Ack, AuthHello, CloseNotice, ResponseEnvelope};

pub async fn handle_socket(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    validator: TokenValidator,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed from {}: {}", peer_addr, e);
            return;
        }
    };

    info!("Incoming connection on the socket end");

    let (mut sink, mut inbound) = ws_stream.split();
    let (conn, mut outbound) = AgentConnection::new();

    // Writer task: drain the outbound queue into the socket. A Close frame
    // ends the task and closes the socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut authenticated = false;

    while let Some(msg) = inbound.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Agent socket error from {}: {}", peer_addr, e);
                break;
            }
        };

        if !authenticated {
            if !authenticate(&text, &conn, &registry, &validator) {
                break;
            }
            authenticated = true;
        } else {
            dispatch_reply(&text, &conn);
        }
    }

    // Ordinary teardown and eviction converge here; force_close is a no-op
    // for a connection the hijack path already closed.
    registry.clear(&conn);
    conn.force_close();
    let _ = writer.await;
    debug!("Agent session from {} ended", peer_addr);
}

/// Run the first-message auth exchange. Returns false when the connection
/// was rejected and the session loop must stop.
fn authenticate(
    text: &str,
    conn: &Arc<AgentConnection>,
    registry: &ConnectionRegistry,
    validator: &TokenValidator,
) -> bool {
    // An undecodable hello is treated exactly like a bad token
    let token = match proto::decode::<AuthHello>(text) {
        Ok(hello) => hello.token,
        Err(_) => {
            warn!("Agent sent an undecodable auth frame!");
            reject(conn);
            return false;
        }
    };

    if !validator.validate(&token) {
        warn!("Client attempting to connect with token {}!", token);
        reject(conn);
        return false;
    }

    if let Ok(frame) = proto::encode(&Ack::new()) {
        if conn.send_text(frame).is_err() {
            return false;
        }
    }
    info!("Connection acknowledged!");

    if let Some(evicted) = registry.install(conn.clone()) {
        info!("Closing connection for existing client");
        if let Ok(notice) = proto::encode(&CloseNotice::hijack()) {
            let _ = evicted.send_text(notice);
        }
        evicted.force_close();
    }

    true
}

fn reject(conn: &Arc<AgentConnection>) {
    if let Ok(notice) = proto::encode(&CloseNotice::bad_token()) {
        let _ = conn.send_text(notice);
    }
    conn.force_close();
}

/// Route a post-auth frame to the waiter holding its correlation id.
fn dispatch_reply(text: &str, conn: &Arc<AgentConnection>) {
    match proto::decode::<ResponseEnvelope>(text) {
        Ok(envelope) => {
            let id = envelope.correlation_id;
            if !conn.pending().resolve(envelope) {
                debug!(correlation_id = %id, "No pending request for reply, dropping");
            }
        }
        Err(e) => {
            warn!("Discarding malformed reply frame: {}", e);
        }
    }
}
