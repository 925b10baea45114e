//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the runtime that wires them.

/// In-memory TTL cache backing the quote cache port.
pub mod cache;

/// Configuration from environment variables.
pub mod config;

/// Exchange stream, wire protocol, event processing, and catalog client.
pub mod exchange;

/// HTTP surface: quotations, markets, health, and metrics.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Component wiring and lifecycle.
pub mod runtime;

/// Cancellable background timers.
pub mod scheduler;

/// OpenTelemetry tracing integration.
pub mod telemetry;
