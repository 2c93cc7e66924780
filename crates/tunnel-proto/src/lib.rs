//! Wire protocol for the reverse-tunnel gateway
//!
//! All frames on the agent channel are JSON text messages. The gateway
//! forwards each public HTTP request as a [`RequestEnvelope`] and the agent
//! answers with a [`ResponseEnvelope`] carrying the same correlation id.

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, ProtoError};
pub use messages::{
    Ack, AuthHello, CloseCode, CloseNotice, CorrelationId, HeaderMap, RequestEnvelope,
    ResponseEnvelope,
};
