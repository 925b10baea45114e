//! Exchange Wire Message Types
//!
//! Serde types for the exchange's JSON stream protocol and its market
//! catalog endpoint.
//!
//! # Stream Protocol
//!
//! ## Outbound
//! - `subscribe` / `unsubscribe`: `{"type":"subscribe","id":"BTCUSD","name":"orderbook","limit":10}`
//! - `ping`: `{"type":"ping"}`
//!
//! ## Inbound
//! - `ticker`: `{"type":"ticker","id":"BTCUSD","ts":1700000000000,"data":{"buy":"100","sell":"99"}}`
//! - `orderbook`: `{"type":"orderbook","id":"BTCUSD","ts":..,"data":{"asks":[["10","1"]],"bids":[["9","2"]]}}`
//! - `pong`: `{"type":"pong"}`
//!
//! # Catalog
//!
//! The catalog endpoint answers with parallel arrays, one entry per market,
//! zipped by index.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::{MarketDescriptor, MarketId};
use crate::domain::quote::PriceLevel;

// =============================================================================
// Outbound Messages
// =============================================================================

/// Frames sent to the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Open interest in a market's channel.
    Subscribe {
        /// Market id.
        id: MarketId,
        /// Channel name (`ticker` or `orderbook`).
        name: &'static str,
        /// Order-book depth, only sent for depth channels.
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },
    /// Drop interest in a market's channel.
    Unsubscribe {
        /// Market id.
        id: MarketId,
        /// Channel name (`ticker` or `orderbook`).
        name: &'static str,
    },
    /// Keepalive.
    Ping,
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// Ticker update payload. Prices arrive as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerData {
    /// Best price a buyer pays (the ask side).
    pub buy: Decimal,
    /// Best price a seller receives (the bid side).
    pub sell: Decimal,
}

/// Ticker update for one market.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerEvent {
    /// Market id.
    pub id: MarketId,
    /// Event time in epoch milliseconds.
    #[serde(default)]
    pub ts: Option<i64>,
    /// Prices.
    pub data: TickerData,
}

/// Order-book snapshot payload as `[price, size]` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct OrderBookData {
    /// Ask levels.
    #[serde(default)]
    pub asks: Vec<[Decimal; 2]>,
    /// Bid levels.
    #[serde(default)]
    pub bids: Vec<[Decimal; 2]>,
}

impl OrderBookData {
    /// Ask side as price levels.
    #[must_use]
    pub fn ask_levels(&self) -> Vec<PriceLevel> {
        to_levels(&self.asks)
    }

    /// Bid side as price levels.
    #[must_use]
    pub fn bid_levels(&self) -> Vec<PriceLevel> {
        to_levels(&self.bids)
    }
}

fn to_levels(pairs: &[[Decimal; 2]]) -> Vec<PriceLevel> {
    pairs
        .iter()
        .map(|[price, size]| PriceLevel::new(*price, *size))
        .collect()
}

/// Order-book snapshot for one market.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderBookEvent {
    /// Market id.
    pub id: MarketId,
    /// Event time in epoch milliseconds.
    #[serde(default)]
    pub ts: Option<i64>,
    /// Book sides.
    #[serde(default)]
    pub data: OrderBookData,
}

/// Keepalive acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PongEvent {
    /// Server time in epoch milliseconds, if reported.
    #[serde(default)]
    pub ts: Option<i64>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Ticker update.
    Ticker(TickerEvent),
    /// Order-book snapshot.
    OrderBook(OrderBookEvent),
    /// Keepalive acknowledgement.
    Pong(PongEvent),
}

// =============================================================================
// Catalog Response
// =============================================================================

/// Market catalog as parallel arrays.
///
/// Any array may be shorter than `symbol`; missing entries take defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogResponse {
    /// Market ids.
    #[serde(default)]
    pub symbol: Vec<Option<String>>,
    /// Quote currencies.
    #[serde(default)]
    pub currency: Vec<Option<String>>,
    /// Base currencies.
    #[serde(default, rename = "base-currency")]
    pub base_currency: Vec<Option<String>>,
    /// Tradable flags.
    #[serde(default, rename = "is-tradable")]
    pub is_tradable: Vec<Option<bool>>,
    /// Price tick scales.
    #[serde(default, rename = "price-scale")]
    pub price_scale: Vec<Option<u64>>,
    /// Minimum size increments.
    #[serde(default, rename = "min-movement")]
    pub min_movement: Vec<Option<Decimal>>,
}

impl CatalogResponse {
    /// Zip the arrays into descriptors.
    ///
    /// Indices missing a symbol, quote currency, or base currency are
    /// skipped. Other fields default to not tradable, scale 1, movement 0.
    #[must_use]
    pub fn into_markets(self) -> Vec<MarketDescriptor> {
        let Self {
            symbol,
            currency,
            base_currency,
            is_tradable,
            price_scale,
            min_movement,
        } = self;

        symbol
            .into_iter()
            .enumerate()
            .filter_map(|(index, id)| {
                let id = non_empty(id)?;
                let quote_currency = non_empty(currency.get(index).cloned().flatten())?;
                let base_currency = non_empty(base_currency.get(index).cloned().flatten())?;

                Some(MarketDescriptor {
                    id: MarketId::new(id),
                    base_currency,
                    quote_currency,
                    price_scale: price_scale.get(index).copied().flatten().unwrap_or(1),
                    min_movement: min_movement
                        .get(index)
                        .copied()
                        .flatten()
                        .unwrap_or(Decimal::ZERO),
                    tradable: is_tradable.get(index).copied().flatten().unwrap_or(false),
                })
            })
            .collect()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Tests
// =============================================================================
