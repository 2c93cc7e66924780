//! WebSocket listener for agent connections

use crate::session;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, warn};
use tunnel_auth::TokenValidator;
use tunnel_control::ConnectionRegistry;

#[derive(Debug, Error)]
pub enum WsServerError {
    #[error("Failed to bind agent listener: {0}")]
    BindError(std::io::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Listener accepting agent WebSocket connections.
pub struct WsServer {
    listener: TcpListener,
    registry: Arc<ConnectionRegistry>,
    validator: TokenValidator,
}

impl WsServer {
    pub async fn bind(
        addr: impl ToSocketAddrs,
        registry: Arc<ConnectionRegistry>,
        validator: TokenValidator,
    ) -> Result<Self, WsServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(WsServerError::BindError)?;
        info!(
            "Agent listener bound to ws://{}",
            listener.local_addr().map_err(WsServerError::IoError)?
        );

        Ok(Self {
            listener,
            registry,
            validator,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, WsServerError> {
        self.listener.local_addr().map_err(WsServerError::IoError)
    }

    /// Accept connections forever, one session task per socket.
    pub async fn run(self) -> Result<(), WsServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let registry = self.registry.clone();
                    let validator = self.validator.clone();
                    tokio::spawn(async move {
                        session::handle_socket(stream, peer_addr, registry, validator).await;
                    });
                }
                Err(e) => {
                    warn!("Failed to accept agent connection: {}", e);
                }
            }
        }
    }
}
