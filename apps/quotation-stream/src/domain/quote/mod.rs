//! Quote Types
//!
//! The normalized best bid/ask the service publishes for a market, and the
//! order-book aggregation used to derive it from depth snapshots.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::MarketId;

/// Latest normalized quote for a market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Market the quote belongs to.
    pub market_id: MarketId,
    /// Bid price.
    pub bid: Decimal,
    /// Ask price.
    pub ask: Decimal,
    /// Event time reported by the exchange.
    pub source_timestamp: DateTime<Utc>,
    /// Time the event was ingested by this service.
    pub ingested_at: DateTime<Utc>,
}

/// One `[price, size]` level of an order-book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    /// Level price.
    pub price: Decimal,
    /// Quantity available at this price.
    pub size: Decimal,
}

impl PriceLevel {
    /// Create a price level.
    #[must_use]
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Size-weighted average price over every level of a book side.
///
/// Computes `Σ(price·size) / Σ(size)` across the whole snapshot depth, not
/// only the top of book. Returns `None` when the side carries no size or the
/// arithmetic overflows.
#[must_use]
pub fn weighted_average_price(levels: &[PriceLevel]) -> Option<Decimal> {
    let mut notional = Decimal::ZERO;
    let mut total_size = Decimal::ZERO;

    for level in levels {
        notional = notional.checked_add(level.price.checked_mul(level.size)?)?;
        total_size = total_size.checked_add(level.size)?;
    }

    if total_size <= Decimal::ZERO {
        return None;
    }

    notional.checked_div(total_size)
}
