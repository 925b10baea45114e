//! Exchange Integration
//!
//! Adapters for the crypto exchange: the streaming connection and its wire
//! protocol, inbound event processing, and the HTTP market catalog.
//!
//! # Architecture
//!
//! ```text
//! QuotationQueryService
//!        |
//!   SubscriptionManager --SubscriptionPort--> StreamConnection --Transport--> exchange
//!                                                  |
//!                                            EventProcessor --> QuoteCache
//! ```

pub mod catalog_client;
pub mod codec;
pub mod connection;
pub mod keepalive;
pub mod messages;
pub mod mock;
pub mod processor;
pub mod websocket;

pub use catalog_client::HttpCatalogSource;
pub use codec::{CodecError, JsonCodec};
pub use connection::StreamConnection;
pub use keepalive::{KeepaliveSnapshot, KeepaliveState};
pub use mock::{MockTransport, StaticCatalogSource};
pub use processor::{DropReason, EventProcessor, ProcessOutcome};
pub use websocket::WsTransport;
