//! Protocol message types
//!
//! Field names are camelCase on the wire; agents written against the
//! original gateway keep working unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Correlation id pairing a forwarded request with its reply.
pub type CorrelationId = Uuid;

/// HTTP headers as carried over the channel. Keys are unique.
pub type HeaderMap = HashMap<String, String>;

/// First message an agent must send on a fresh connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthHello {
    pub token: String,
}

/// Sent to the agent after a successful authentication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ack {
    pub ack: bool,
}

impl Ack {
    pub fn new() -> Self {
        Self { ack: true }
    }
}

impl Default for Ack {
    fn default() -> Self {
        Self::new()
    }
}

/// Reason codes attached to a close notice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CloseCode {
    #[serde(rename = "bad-token")]
    BadToken,
    #[serde(rename = "hijack")]
    Hijack,
}

/// Structured notice sent to an agent right before the gateway closes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloseNotice {
    pub closing: bool,
    pub reason: String,
    pub code: CloseCode,
}

impl CloseNotice {
    pub fn bad_token() -> Self {
        Self {
            closing: true,
            reason: "Bad token".to_string(),
            code: CloseCode::BadToken,
        }
    }

    pub fn hijack() -> Self {
        Self {
            closing: true,
            reason: "Connection hijacking".to_string(),
            code: CloseCode::Hijack,
        }
    }
}

/// A public HTTP request serialized for the agent channel.
///
/// `referrer`, `referrer_policy`, `credentials` and `destination` mirror the
/// Fetch-API request attributes the original gateway forwarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub body: String,
    pub headers: HeaderMap,
    pub method: String,
    pub referrer: String,
    pub referrer_policy: String,
    pub credentials: String,
    pub destination: String,
    pub url: String,
    pub correlation_id: CorrelationId,
}

/// The agent's reply to one [`RequestEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub body: String,
    pub status: u16,
    #[serde(default)]
    pub headers: HeaderMap,
    #[serde(default)]
    pub status_text: String,
    pub correlation_id: CorrelationId,
}
