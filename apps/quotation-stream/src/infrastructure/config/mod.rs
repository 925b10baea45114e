//! Configuration Module
//!
//! Environment-driven settings for the quotation service.

mod settings;

pub use settings::{
    CacheSettings, CatalogSettings, ConfigError, DEFAULT_CURRENCY_PRECISION, QuotationConfig,
    ServerSettings, StreamSettings, parse_currency_precision,
};
