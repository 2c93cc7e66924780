//! Encoding/decoding of channel frames
//!
//! Frames are JSON text; the WebSocket layer already provides message
//! boundaries, so no length prefix is needed.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Codec errors
#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("Serialization error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Malformed frame: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// Encode a message to a JSON text frame.
pub fn encode<T: Serialize>(msg: &T) -> Result<String, ProtoError> {
    serde_json::to_string(msg).map_err(ProtoError::Serialize)
}

/// Decode a JSON text frame into a message.
pub fn decode<T: DeserializeOwned>(frame: &str) -> Result<T, ProtoError> {
    serde_json::from_str(frame).map_err(ProtoError::Deserialize)
}
