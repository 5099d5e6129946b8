//! Transport event vocabulary.
//!
//! Outbound (surface to relay):
//! `{"type":"chat-request","value":{"messages":[...],"model":"..."}}`
//!
//! Inbound (relay to surface):
//! `{"type":"response-chunk","value":"..."}`,
//! `{"type":"response-end"}` or
//! `{"type":"response-error","value":"...","kind":"http"}`.
//! The `kind` field is optional on decode and defaults to `network`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::RequestEnvelope;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum OutboundEvent {
    ChatRequest(RequestEnvelope),
}

/// Classification of a relay-side failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayErrorKind {
    /// The backend answered with a non-success status.
    Http,
    /// Connect, transport or mid-stream read failure.
    #[default]
    Network,
    /// No usable bearer credential; the call was never attempted.
    Credential,
}

impl RelayErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RelayErrorKind::Http => "http",
            RelayErrorKind::Network => "network",
            RelayErrorKind::Credential => "credential",
        }
    }
}

impl fmt::Display for RelayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RelayFailure {
    pub kind: RelayErrorKind,
    pub message: String,
}

impl RelayFailure {
    pub fn new(kind: RelayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: &str) -> Self {
        Self::new(
            RelayErrorKind::Http,
            format!("Request failed with status {status}: {body}"),
        )
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::Network, message)
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::new(RelayErrorKind::Credential, message)
    }
}

/// Inbound protocol event, as applied by the stream assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "InboundWire", from = "InboundWire")]
pub enum ProtocolEvent {
    Chunk(String),
    End,
    Error(RelayFailure),
}

impl ProtocolEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProtocolEvent::Chunk(_))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum InboundWire {
    ResponseChunk {
        value: String,
    },
    ResponseEnd,
    ResponseError {
        value: String,
        #[serde(default)]
        kind: RelayErrorKind,
    },
}

impl From<ProtocolEvent> for InboundWire {
    fn from(event: ProtocolEvent) -> Self {
        match event {
            ProtocolEvent::Chunk(value) => InboundWire::ResponseChunk { value },
            ProtocolEvent::End => InboundWire::ResponseEnd,
            ProtocolEvent::Error(failure) => InboundWire::ResponseError {
                value: failure.message,
                kind: failure.kind,
            },
        }
    }
}

impl From<InboundWire> for ProtocolEvent {
    fn from(wire: InboundWire) -> Self {
        match wire {
            InboundWire::ResponseChunk { value } => ProtocolEvent::Chunk(value),
            InboundWire::ResponseEnd => ProtocolEvent::End,
            InboundWire::ResponseError { value, kind } => {
                ProtocolEvent::Error(RelayFailure::new(kind, value))
            }
        }
    }
}

pub fn encode<T: Serialize>(event: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(raw)
}
