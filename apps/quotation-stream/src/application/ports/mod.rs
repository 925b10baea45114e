//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TtlCache`: key/value store with per-entry expiry (quote cache)
//! - `CatalogSource`: fetches the exchange market catalog
//! - `Transport` / `TransportHandle`: the persistent duplex socket
//!
//! ## Internal Ports
//!
//! - `SubscriptionPort`: subscription control exposed by the stream
//!   connection to the subscription manager

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::market::{MarketDescriptor, MarketId};
use crate::domain::quote::Quote;

// =============================================================================
// Cache Port
// =============================================================================

/// Key/value store whose entries expire after a per-entry time-to-live.
///
/// Expiry is passive: a `get` after the TTL elapsed behaves as if the key
/// was never set. Any store with these semantics satisfies the port.
#[async_trait]
pub trait TtlCache<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Read the live value for `key`, if any.
    async fn get(&self, key: &K) -> Option<V>;

    /// Store `value` under `key`, replacing any previous value, for `ttl`.
    async fn set(&self, key: K, value: V, ttl: Duration);
}

/// The quote cache: market id to latest quote.
pub type QuoteCache = dyn TtlCache<MarketId, Quote>;

// =============================================================================
// Catalog Port
// =============================================================================

/// Errors returned by a catalog source.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The request could not be sent or completed.
    #[error("catalog request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("catalog endpoint returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
}

/// Source of the exchange market catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the full list of markets.
    async fn fetch_markets(&self) -> Result<Vec<MarketDescriptor>, CatalogError>;
}

// =============================================================================
// Transport Port
// =============================================================================

/// Lifecycle and data events reported by a transport session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The socket is open and accepts frames.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The socket closed.
    Closed {
        /// Human-readable close reason.
        reason: String,
    },
    /// The socket failed to open or broke.
    Errored(String),
}

/// Errors returned by a transport handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The session has ended and no longer accepts frames.
    #[error("transport session is closed")]
    Closed,
}

/// Factory for socket sessions to the exchange.
///
/// `connect` returns immediately. The session reports `Opened`, inbound
/// messages, and its end on `events`.
pub trait Transport: Send + Sync {
    /// Open a new session delivering its events on `events`.
    fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Box<dyn TransportHandle>;
}

/// Outbound side of one transport session.
pub trait TransportHandle: Send + Sync {
    /// Queue a text frame for sending.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Closed` if the session has ended.
    fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Close the session. Further sends fail.
    fn close(&self);
}

// =============================================================================
// Subscription Port
// =============================================================================

/// Subscription control over the stream connection.
pub trait SubscriptionPort: Send + Sync {
    /// Markets the connection currently holds interest in.
    fn subscribed(&self) -> HashSet<MarketId>;

    /// Add interest in a market, sending one wire message when connected.
    fn subscribe(&self, market: &MarketId);

    /// Drop interest in a market, sending one wire message when connected.
    fn unsubscribe(&self, market: &MarketId);
}
