//! JSON envelope carried inside relay payloads.
//!
//! Boards send `{"type":"MOVE","from":{"x":4,"y":1},"to":{"x":4,"y":3}}`
//! text frames. The relay forwards them untouched; only boards decode them.
//! Envelopes with an unrecognised `type` decode to [`ClientMessage::Unknown`]
//! so that newer boards can add message kinds without breaking older ones.

use serde::{Deserialize, Serialize};

use crate::square::Square;

/// Errors produced while encoding or decoding an envelope.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The payload is not valid JSON, or a field has the wrong shape.
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is a JSON value without a `type` field.
    #[error("invalid message: missing `type` field")]
    MissingType,
}

/// Messages exchanged between boards through the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// A piece moved from one square to another.
    Move {
        /// Origin square.
        from: Square,
        /// Destination square.
        to: Square,
    },

    /// Any envelope whose `type` this build does not know.
    #[serde(other)]
    Unknown,
}

/// Encodes a [`ClientMessage`] as a JSON string.
///
/// # Errors
///
/// Returns [`ProtoError::Json`] if serialization fails.
pub fn encode(msg: &ClientMessage) -> Result<String, ProtoError> {
    Ok(serde_json::to_string(msg)?)
}

/// Decodes a [`ClientMessage`] from JSON text.
///
/// # Errors
///
/// Returns [`ProtoError::MissingType`] if the payload has no `type` field and
/// [`ProtoError::Json`] for malformed JSON or fields (including off-board
/// squares).
pub fn decode(text: &str) -> Result<ClientMessage, ProtoError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.get("type").is_none() {
        return Err(ProtoError::MissingType);
    }
    Ok(serde_json::from_value(value)?)
}
