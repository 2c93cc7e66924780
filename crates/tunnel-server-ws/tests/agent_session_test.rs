//! Integration tests driving the agent listener with a real WebSocket client

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::protocol::Message;
use tunnel_auth::TokenValidator;
use tunnel_control::{ConnectionRegistry, InboundRequest, Relay};
use tunnel_proto::HeaderMap;
use tunnel_server_ws::WsServer;

const TOKEN: &str = "it-is-a-secret";

async fn start_server() -> (SocketAddr, Arc<ConnectionRegistry>) {
    let registry = Arc::new(ConnectionRegistry::new());
    let server = WsServer::bind(
        "127.0.0.1:0",
        registry.clone(),
        TokenValidator::new(TOKEN),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (addr, registry)
}

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
        .await
        .unwrap();
    ws
}

async fn next_text(ws: &mut WsClient) -> String {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed unexpectedly")
            .expect("socket error")
        {
            Message::Text(text) => return text,
            Message::Close(_) => panic!("socket closed while expecting text"),
            _ => continue,
        }
    }
}

async fn authenticate(ws: &mut WsClient) {
    ws.send(Message::Text(format!(r#"{{"token":"{}"}}"#, TOKEN)))
        .await
        .unwrap();
    let ack: serde_json::Value = serde_json::from_str(&next_text(ws).await).unwrap();
    assert_eq!(ack["ack"], true);
}

/// Wait until the registry observes (or stops observing) a connection.
async fn wait_for_registry(registry: &ConnectionRegistry, occupied: bool) {
    for _ in 0..100 {
        if registry.current().is_some() == occupied {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("registry never reached the expected state");
}

#[tokio::test]
async fn test_bad_token_is_rejected_and_closed() {
    let (addr, registry) = start_server().await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text(r#"{"token":"wrong"}"#.to_string()))
        .await
        .unwrap();

    let notice: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(notice["closing"], true);
    assert_eq!(notice["reason"], "Bad token");
    assert_eq!(notice["code"], "bad-token");

    // The gateway closes the socket after the notice
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap()
        {
            None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
            Some(Ok(_)) => continue,
        }
    }

    // Registry untouched by the rejected connection
    assert!(registry.current().is_none());
}

#[tokio::test]
async fn test_garbled_auth_frame_is_rejected() {
    let (addr, registry) = start_server().await;
    let mut ws = connect(addr).await;

    ws.send(Message::Text("not json".to_string())).await.unwrap();

    let notice: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(notice["code"], "bad-token");
    assert!(registry.current().is_none());
}

#[tokio::test]
async fn test_bad_token_leaves_active_agent_untouched() {
    let (addr, registry) = start_server().await;

    let mut agent = connect(addr).await;
    authenticate(&mut agent).await;
    wait_for_registry(&registry, true).await;
    let active_id = registry.current().unwrap().id();

    let mut intruder = connect(addr).await;
    intruder
        .send(Message::Text(r#"{"token":"wrong"}"#.to_string()))
        .await
        .unwrap();
    let notice: serde_json::Value = serde_json::from_str(&next_text(&mut intruder).await).unwrap();
    assert_eq!(notice["code"], "bad-token");

    // The rejected connection never reaches the registry
    assert_eq!(registry.current().unwrap().id(), active_id);
}

#[tokio::test]
async fn test_successful_auth_installs_connection() {
    let (addr, registry) = start_server().await;
    let mut ws = connect(addr).await;

    authenticate(&mut ws).await;
    wait_for_registry(&registry, true).await;

    // Dropping the agent clears the slot again
    drop(ws);
    wait_for_registry(&registry, false).await;
}

#[tokio::test]
async fn test_second_auth_hijacks_first() {
    let (addr, registry) = start_server().await;

    let mut first = connect(addr).await;
    authenticate(&mut first).await;
    wait_for_registry(&registry, true).await;
    let first_id = registry.current().unwrap().id();

    let mut second = connect(addr).await;
    authenticate(&mut second).await;

    // The first agent receives the hijack notice before being force-closed
    let notice: serde_json::Value = serde_json::from_str(&next_text(&mut first).await).unwrap();
    assert_eq!(notice["closing"], true);
    assert_eq!(notice["reason"], "Connection hijacking");
    assert_eq!(notice["code"], "hijack");

    // The registry now holds exactly the second connection
    for _ in 0..100 {
        if registry.current().map(|c| c.id()) != Some(first_id) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let current = registry.current().unwrap();
    assert_ne!(current.id(), first_id);
}

#[tokio::test]
async fn test_full_relay_round_trip_over_websocket() {
    let (addr, registry) = start_server().await;
    let relay = Relay::new(registry.clone(), Duration::from_secs(5));

    let mut agent = connect(addr).await;
    authenticate(&mut agent).await;
    wait_for_registry(&registry, true).await;

    let relayed = tokio::spawn(async move {
        relay
            .relay(InboundRequest {
                method: "GET".to_string(),
                url: "http://x/y".to_string(),
                headers: HeaderMap::new(),
                body: String::new(),
                referrer: "about:client".to_string(),
                referrer_policy: String::new(),
            })
            .await
    });

    // The agent sees the envelope and echoes a reply with the same id
    let request: serde_json::Value = serde_json::from_str(&next_text(&mut agent).await).unwrap();
    assert_eq!(request["method"], "GET");
    assert_eq!(request["url"], "http://x/y");
    let correlation_id = request["correlationId"].as_str().unwrap().to_string();

    agent
        .send(Message::Text(format!(
            r#"{{"body":"hi","status":200,"headers":{{}},"statusText":"OK","correlationId":"{}"}}"#,
            correlation_id
        )))
        .await
        .unwrap();

    let reply = relayed.await.unwrap().unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "hi");
    assert_eq!(reply.status_text, "OK");
}
