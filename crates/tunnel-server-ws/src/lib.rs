//! Agent-facing WebSocket listener
//!
//! Accepts agent connections, runs the per-connection auth handshake
//! (first message only), and routes subsequent frames to the connection's
//! pending-reply table.

pub mod server;
pub mod session;

pub use server::{WsServer, WsServerError};
