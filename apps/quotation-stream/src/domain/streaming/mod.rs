//! Streaming Types
//!
//! Connection lifecycle state and the exchange channels a market can be
//! quoted from.

use serde::Serialize;

/// Lifecycle state of the exchange stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket is open.
    #[default]
    Disconnected,
    /// A socket was requested and the transport has not opened yet.
    Connecting,
    /// The transport is open and accepting wire messages.
    Connected,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    /// Check if wire messages can be sent.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Exchange channel used to derive quotes for a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteChannel {
    /// Best bid/ask carried directly by the exchange.
    Ticker,
    /// Order-book snapshots, averaged by size per side.
    #[default]
    OrderBook,
}

impl QuoteChannel {
    /// Parse channel from string.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ticker" => Self::Ticker,
            _ => Self::OrderBook,
        }
    }

    /// Get the channel name used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::OrderBook => "orderbook",
        }
    }
}
