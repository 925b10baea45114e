//! Domain Layer - Core market data types and business rules.
//!
//! This layer contains the core domain types for quotation ingestion
//! with no I/O. All types here are pure Rust with serialization support.

/// Tradable markets and their numeric derivations.
pub mod market;

/// Quotes and order-book price aggregation.
pub mod quote;

/// Stream connection state and quote channels.
pub mod streaming;

/// Subscription diffing and demand tracking.
pub mod subscription;
