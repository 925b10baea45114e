//! Event Processor
//!
//! Turns inbound stream frames into normalized quotes:
//!
//! - `ticker`: `bid = sell`, `ask = buy`
//! - `orderbook`: each side priced by its size-weighted average over the
//!   whole snapshot depth
//! - `pong`: counted as a keepalive ack
//!
//! Frames that cannot produce a quote are dropped with a warning and never
//! raised to the connection.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::application::ports::{QuoteCache, TtlCache};
use crate::application::services::MarketCatalog;
use crate::domain::market::MarketId;
use crate::domain::quote::{Quote, weighted_average_price};
use crate::infrastructure::exchange::codec::{CodecError, JsonCodec};
use crate::infrastructure::exchange::keepalive::KeepaliveState;
use crate::infrastructure::exchange::messages::{InboundMessage, OrderBookEvent, TickerEvent};
use crate::infrastructure::metrics::{self, EventType};

/// Why an inbound frame produced no quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Not valid JSON or does not match its type's schema.
    Malformed,
    /// A `type` this service does not handle.
    UnsupportedType,
    /// The market id is not in the current catalog.
    UnknownMarket,
    /// An order-book side has no size, so it has no price.
    EmptyBook,
}

impl DropReason {
    /// Metric label for the reason.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnsupportedType => "unsupported_type",
            Self::UnknownMarket => "unknown_market",
            Self::EmptyBook => "empty_book",
        }
    }
}

/// Result of processing one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A quote was written to the cache for this market.
    Quoted(MarketId),
    /// A keepalive ack was counted.
    KeepaliveAck,
    /// The frame was dropped.
    Dropped(DropReason),
}

/// Decodes inbound frames and writes quotes to the cache.
pub struct EventProcessor {
    catalog: Arc<MarketCatalog>,
    cache: Arc<QuoteCache>,
    keepalive: Arc<KeepaliveState>,
    codec: JsonCodec,
    quote_ttl: Duration,
}

impl EventProcessor {
    /// Create a processor writing quotes with the given freshness window.
    #[must_use]
    pub fn new(
        catalog: Arc<MarketCatalog>,
        cache: Arc<QuoteCache>,
        keepalive: Arc<KeepaliveState>,
        quote_ttl: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            keepalive,
            codec: JsonCodec::new(),
            quote_ttl,
        }
    }

    /// Shared keepalive counters.
    #[must_use]
    pub fn keepalive(&self) -> &Arc<KeepaliveState> {
        &self.keepalive
    }

    /// Process one inbound text frame.
    ///
    /// Every accepted ticker or order-book event performs exactly one cache
    /// write.
    pub async fn process(&self, text: &str) -> ProcessOutcome {
        let started = std::time::Instant::now();

        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => {
                let reason = match e {
                    CodecError::UnknownMessageType(_) => DropReason::UnsupportedType,
                    CodecError::Json(_) | CodecError::InvalidFormat(_) => DropReason::Malformed,
                };
                metrics::record_event_received(EventType::Other);
                return Self::drop_event(reason, &e);
            }
        };

        let (event_type, outcome) = match message {
            InboundMessage::Ticker(event) => (EventType::Ticker, self.on_ticker(event).await),
            InboundMessage::OrderBook(event) => {
                (EventType::OrderBook, self.on_orderbook(event).await)
            }
            InboundMessage::Pong(_) => {
                self.keepalive.record_ack();
                metrics::record_keepalive_ack();
                tracing::debug!(
                    acks = self.keepalive.acks_received(),
                    "Keepalive ack received"
                );
                (EventType::Pong, ProcessOutcome::KeepaliveAck)
            }
        };

        metrics::record_event_received(event_type);
        metrics::record_processing_duration(event_type, started.elapsed());
        outcome
    }

    async fn on_ticker(&self, event: TickerEvent) -> ProcessOutcome {
        if let Some(outcome) = self.reject_unknown(&event.id) {
            return outcome;
        }

        let quote = Quote {
            market_id: event.id,
            bid: event.data.sell,
            ask: event.data.buy,
            source_timestamp: source_time(event.ts),
            ingested_at: Utc::now(),
        };
        self.store(quote).await
    }

    async fn on_orderbook(&self, event: OrderBookEvent) -> ProcessOutcome {
        if let Some(outcome) = self.reject_unknown(&event.id) {
            return outcome;
        }

        let ask = weighted_average_price(&event.data.ask_levels());
        let bid = weighted_average_price(&event.data.bid_levels());
        let (Some(bid), Some(ask)) = (bid, ask) else {
            tracing::debug!(market_id = %event.id, "Order book side without size, skipping");
            metrics::record_event_dropped(DropReason::EmptyBook.as_str());
            return ProcessOutcome::Dropped(DropReason::EmptyBook);
        };

        let quote = Quote {
            market_id: event.id,
            bid,
            ask,
            source_timestamp: source_time(event.ts),
            ingested_at: Utc::now(),
        };
        self.store(quote).await
    }

    fn reject_unknown(&self, id: &MarketId) -> Option<ProcessOutcome> {
        if self.catalog.find(id).is_some() {
            return None;
        }
        tracing::warn!(market_id = %id, "Event for market not in catalog, dropping");
        metrics::record_event_dropped(DropReason::UnknownMarket.as_str());
        Some(ProcessOutcome::Dropped(DropReason::UnknownMarket))
    }

    async fn store(&self, quote: Quote) -> ProcessOutcome {
        let market_id = quote.market_id.clone();
        tracing::trace!(
            market_id = %market_id,
            bid = %quote.bid,
            ask = %quote.ask,
            "Quote updated"
        );
        self.cache
            .set(market_id.clone(), quote, self.quote_ttl)
            .await;
        ProcessOutcome::Quoted(market_id)
    }

    fn drop_event(reason: DropReason, error: &CodecError) -> ProcessOutcome {
        tracing::warn!(error = %error, reason = reason.as_str(), "Dropping inbound frame");
        metrics::record_event_dropped(reason.as_str());
        ProcessOutcome::Dropped(reason)
    }
}

impl std::fmt::Debug for EventProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProcessor")
            .field("quote_ttl", &self.quote_ttl)
            .finish_non_exhaustive()
    }
}

/// Exchange event time, or now when the frame carries none.
fn source_time(ts: Option<i64>) -> DateTime<Utc> {
    ts.and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}
