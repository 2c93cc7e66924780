//! Reverse-tunnel gateway
//!
//! Public HTTP clients reach a backend agent that has no inbound
//! reachability: each request is relayed over a single agent-initiated
//! WebSocket channel and the agent's reply becomes the HTTP response.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tunnel_auth::TokenValidator;
use tunnel_control::{ConnectionRegistry, Relay};
use tunnel_server_http::{AppState, HttpServer};
use tunnel_server_ws::WsServer;

/// Reverse-tunnel gateway - relays public HTTP traffic to a single agent
#[derive(Parser, Debug)]
#[command(name = "tunnel-gateway")]
#[command(about = "Relay public HTTP requests to an agent over a WebSocket tunnel", long_about = None)]
#[command(version = env!("GIT_TAG"))]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Public HTTP listener port
    #[arg(long, env = "HTTP_PORT", default_value = "80")]
    http_port: u16,

    /// Agent WebSocket listener port
    #[arg(long, env = "WEB_SOCKET_PORT", default_value = "8100")]
    ws_port: u16,

    /// Shared secret agents must present on connect
    #[arg(long, env = "TOKEN")]
    token: String,

    /// Bind address for both listeners
    #[arg(long, env = "HOST_NAME", default_value = "0.0.0.0")]
    host: String,

    /// How long to wait for an agent reply before failing a request
    #[arg(long, default_value = "30")]
    reply_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    info!(
        "Running gateway server at http://{}:{} and directing to port {}:{}",
        cli.host, cli.http_port, cli.host, cli.ws_port
    );

    let registry = Arc::new(ConnectionRegistry::new());
    let relay = Relay::new(registry.clone(), Duration::from_secs(cli.reply_timeout_secs));
    let validator = TokenValidator::new(cli.token);

    let ws_server = WsServer::bind((cli.host.as_str(), cli.ws_port), registry, validator)
        .await
        .context("Failed to start the agent listener")?;
    tokio::spawn(async move {
        if let Err(e) = ws_server.run().await {
            error!("Agent listener failed: {}", e);
        }
    });

    let http_server = HttpServer::bind(
        (cli.host.as_str(), cli.http_port),
        Arc::new(AppState { relay }),
    )
    .await
    .context("Failed to start the HTTP listener")?;

    http_server.run().await.context("HTTP server failed")?;

    Ok(())
}
