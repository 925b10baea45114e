#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Quotation Stream - Exchange Market Data Ingestion
//!
//! Keeps one streaming connection to a crypto exchange, subscribes to the
//! markets callers ask quotes for, and answers from a time-bounded cache of
//! the latest best bid/ask per market.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core types and pure logic
//!   - `market`: Catalog descriptors and trading-rule derivations
//!   - `quote`: Normalized quotes and order-book aggregation
//!   - `streaming`: Connection state and quote channels
//!   - `subscription`: Subscription diffs and demand tracking
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Cache, catalog source, transport, subscription control
//!   - `services`: Market catalog, subscription manager, quotation queries
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `exchange`: WebSocket stream, wire codec, event processing, catalog client
//!   - `cache`: In-memory TTL cache
//!   - `runtime`: Component wiring and background timers
//!   - `http`: Quotations, markets, health, and metrics endpoints
//!   - `config`: Environment configuration
//!
//! # Data Flow
//!
//! ```text
//! HTTP /quotations -> QuotationQueryService -> SubscriptionManager
//!                           |                          |
//!                      QuoteCache <- EventProcessor <- StreamConnection <-> exchange WS
//!                           ^
//!                      MarketCatalog <- catalog HTTP (hourly)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{MarketDescriptor, MarketId, TradingRules};
pub use domain::quote::{PriceLevel, Quote};
pub use domain::streaming::{ConnectionState, QuoteChannel};
pub use domain::subscription::{DemandTracker, SubscriptionChanges};

// Ports and services
pub use application::ports::{
    CatalogError, CatalogSource, QuoteCache, SubscriptionPort, Transport, TransportError,
    TransportEvent, TransportHandle, TtlCache,
};
pub use application::services::{MarketCatalog, QuotationQueryService, SubscriptionManager};

// Infrastructure config
pub use infrastructure::config::{
    CacheSettings, CatalogSettings, ConfigError, QuotationConfig, ServerSettings, StreamSettings,
};

// Exchange adapters (mocks for integration tests)
pub use infrastructure::exchange::{
    EventProcessor, HttpCatalogSource, MockTransport, ProcessOutcome, StaticCatalogSource,
    StreamConnection, WsTransport,
};

// Cache, runtime, and HTTP surface
pub use infrastructure::cache::InMemoryTtlCache;
pub use infrastructure::http::{HttpServer, HttpServerError, HttpState};
pub use infrastructure::runtime::QuotationRuntime;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
