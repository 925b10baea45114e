//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (socket, catalog, cache).
pub mod ports;

/// Application services for the catalog, subscriptions and quotations.
pub mod services;
