//! Stream Codec
//!
//! JSON encoding and decoding for the exchange stream.
//!
//! Decoding reads the `type` discriminator first, then parses the frame
//! straight into the matching event type so decimal strings never pass
//! through an intermediate float.

use serde::Deserialize;

use crate::infrastructure::exchange::messages::{
    InboundMessage, OrderBookEvent, OutboundMessage, PongEvent, TickerEvent,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

#[derive(Deserialize)]
struct TypeProbe {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// JSON codec for the exchange stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object, carries no
    /// `type`, names an unsupported type, or does not match its type's
    /// schema.
    pub fn decode(&self, text: &str) -> Result<InboundMessage, CodecError> {
        let trimmed = text.trim();
        if !trimmed.starts_with('{') {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}",
                preview(trimmed)
            )));
        }

        let probe: TypeProbe = serde_json::from_str(trimmed)?;
        let kind = probe
            .kind
            .ok_or_else(|| CodecError::InvalidFormat("missing \"type\" field".to_string()))?;

        match kind.as_str() {
            "ticker" => Ok(InboundMessage::Ticker(serde_json::from_str::<TickerEvent>(
                trimmed,
            )?)),
            "orderbook" => Ok(InboundMessage::OrderBook(
                serde_json::from_str::<OrderBookEvent>(trimmed)?,
            )),
            "pong" => Ok(InboundMessage::Pong(serde_json::from_str::<PongEvent>(
                trimmed,
            )?)),
            other => Err(CodecError::UnknownMessageType(other.to_string())),
        }
    }

    /// Encode an outbound message to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self, message: &OutboundMessage) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }
}

fn preview(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(50)
        .map_or(text.len(), |(index, _)| index);
    &text[..end]
}
