//! Market Catalog Types
//!
//! Tradable markets as published by the exchange catalog, plus the numeric
//! derivations the platform applies to them.
//!
//! # Derivations
//!
//! - `min_size`: the catalog's minimum movement expressed in the platform's
//!   integer fixed-point representation of the base currency.
//! - `price_significant_digits`: `ceil(log10(price_scale))`.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

// =============================================================================
// Market Identifier
// =============================================================================

/// Exchange-native market identifier (e.g. `BTCUSD`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a market identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarketId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// =============================================================================
// Market Descriptor
// =============================================================================

/// A market listed in the exchange catalog.
///
/// Descriptors are immutable: a catalog refresh replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDescriptor {
    /// Exchange-native market identifier.
    pub id: MarketId,
    /// Base currency symbol (the asset being priced).
    pub base_currency: String,
    /// Quote currency symbol (the asset prices are expressed in).
    pub quote_currency: String,
    /// Price tick scale (e.g. `100` for two decimals).
    pub price_scale: u64,
    /// Smallest tradable size increment, in base currency units.
    pub min_movement: Decimal,
    /// Whether the exchange currently accepts trading on this market.
    pub tradable: bool,
}

impl MarketDescriptor {
    /// Check whether this market prices `base` in `quote` (ASCII case-insensitive).
    #[must_use]
    pub fn matches_pair(&self, base: &str, quote: &str) -> bool {
        self.base_currency.eq_ignore_ascii_case(base)
            && self.quote_currency.eq_ignore_ascii_case(quote)
    }

    /// Number of significant price digits, `ceil(log10(price_scale))`.
    #[must_use]
    pub const fn price_significant_digits(&self) -> u32 {
        significant_digits(self.price_scale)
    }

    /// Minimum order size in integer fixed-point units of the base currency.
    ///
    /// Rounds up so a representable minimum never collapses to zero.
    /// Returns `None` if the value does not fit.
    #[must_use]
    pub fn min_size(&self, base_precision: u32) -> Option<u64> {
        let factor = 10_u64.checked_pow(base_precision)?;
        self.min_movement
            .checked_mul(Decimal::from(factor))?
            .ceil()
            .to_u64()
    }

    /// Derive the platform trading rules for this market.
    #[must_use]
    pub fn trading_rules(&self, base_precision: u32) -> TradingRules {
        TradingRules {
            min_size: self.min_size(base_precision),
            price_significant_digits: self.price_significant_digits(),
        }
    }
}

/// Trading rules derived from a market descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TradingRules {
    /// Minimum order size in integer fixed-point units.
    pub min_size: Option<u64>,
    /// Significant digits used when rendering prices.
    pub price_significant_digits: u32,
}

/// Compute `ceil(log10(scale))` without floating point.
///
/// Scales of `0` and `1` have no fractional digits.
#[must_use]
pub const fn significant_digits(scale: u64) -> u32 {
    let mut digits = 0;
    let mut bound: u64 = 1;
    while bound < scale {
        bound = bound.saturating_mul(10);
        digits += 1;
    }
    digits
}

// =============================================================================
// Tests
// =============================================================================
