//! Control plane for the reverse-tunnel gateway
//!
//! Owns the single authoritative agent connection and the request/response
//! relay engine: connection arbitration (install/evict/clear), the
//! pending-reply table correlating forwarded requests with agent replies,
//! and the per-request relay entry point.

pub mod connection;
pub mod pending;
pub mod registry;
pub mod relay;

pub use connection::{AgentConnection, ChannelClosed, OutboundFrame};
pub use pending::PendingReplies;
pub use registry::ConnectionRegistry;
pub use relay::{InboundRequest, Relay, RelayError};
