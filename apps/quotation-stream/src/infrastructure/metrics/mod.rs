//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Events**: Inbound stream events by type, dropped events by reason
//! - **Wire**: Outbound subscribe/unsubscribe/ping frames
//! - **Connection**: Stream connection state and keepalive traffic
//! - **Catalog**: Refresh outcomes and market count
//! - **Latency**: Event processing time
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::streaming::ConnectionState;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns an error if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Event counters
    describe_counter!(
        "quotation_stream_events_received_total",
        "Total inbound stream events by type"
    );
    describe_counter!(
        "quotation_stream_events_dropped_total",
        "Total inbound stream events dropped by reason"
    );
    describe_counter!(
        "quotation_stream_wire_messages_sent_total",
        "Total outbound wire messages by type"
    );

    // Keepalive counters
    describe_counter!(
        "quotation_stream_keepalive_pings_total",
        "Total keepalive pings sent"
    );
    describe_counter!(
        "quotation_stream_keepalive_acks_total",
        "Total keepalive acks received"
    );

    // Catalog
    describe_counter!(
        "quotation_stream_catalog_refreshes_total",
        "Total catalog refresh attempts by outcome"
    );
    describe_gauge!(
        "quotation_stream_catalog_markets",
        "Number of markets in the current catalog snapshot"
    );

    // Connection and subscription gauges
    describe_gauge!(
        "quotation_stream_connection_state",
        "Stream connection state (0 disconnected, 1 connecting, 2 connected)"
    );
    describe_gauge!(
        "quotation_stream_subscriptions",
        "Number of markets the stream connection subscribes to"
    );

    // Latency histograms
    describe_histogram!(
        "quotation_stream_event_processing_seconds",
        "Time to decode an inbound event and write its quote"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for inbound event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// Ticker update.
    Ticker,
    /// Order-book snapshot.
    OrderBook,
    /// Keepalive ack.
    Pong,
    /// Anything else.
    Other,
}

impl EventType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::OrderBook => "orderbook",
            Self::Pong => "pong",
            Self::Other => "other",
        }
    }
}

/// Metric labels for outbound wire messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMessage {
    /// Subscribe to a market.
    Subscribe,
    /// Unsubscribe from a market.
    Unsubscribe,
    /// Keepalive ping.
    Ping,
}

impl WireMessage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Ping => "ping",
        }
    }
}

/// Record an inbound stream event.
pub fn record_event_received(event_type: EventType) {
    counter!(
        "quotation_stream_events_received_total",
        "event_type" => event_type.as_str()
    )
    .increment(1);
}

/// Record an inbound event that produced no quote.
pub fn record_event_dropped(reason: &'static str) {
    counter!(
        "quotation_stream_events_dropped_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record an outbound wire message.
pub fn record_wire_message(message: WireMessage) {
    counter!(
        "quotation_stream_wire_messages_sent_total",
        "message_type" => message.as_str()
    )
    .increment(1);
    if message == WireMessage::Ping {
        counter!("quotation_stream_keepalive_pings_total").increment(1);
    }
}

/// Record a keepalive ack.
pub fn record_keepalive_ack() {
    counter!("quotation_stream_keepalive_acks_total").increment(1);
}

/// Record a catalog refresh attempt.
pub fn record_catalog_refresh(success: bool) {
    counter!(
        "quotation_stream_catalog_refreshes_total",
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Update the catalog market count.
#[allow(clippy::cast_precision_loss)]
pub fn set_catalog_markets(count: usize) {
    gauge!("quotation_stream_catalog_markets").set(count as f64);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: ConnectionState) {
    let value = match state {
        ConnectionState::Disconnected => 0.0,
        ConnectionState::Connecting => 1.0,
        ConnectionState::Connected => 2.0,
    };
    gauge!("quotation_stream_connection_state").set(value);
}

/// Update the subscription count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(count: usize) {
    gauge!("quotation_stream_subscriptions").set(count as f64);
}

/// Record event processing duration.
pub fn record_processing_duration(event_type: EventType, duration: Duration) {
    histogram!(
        "quotation_stream_event_processing_seconds",
        "event_type" => event_type.as_str()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_as_str() {
        assert_eq!(EventType::Ticker.as_str(), "ticker");
        assert_eq!(EventType::OrderBook.as_str(), "orderbook");
        assert_eq!(EventType::Pong.as_str(), "pong");
        assert_eq!(EventType::Other.as_str(), "other");
    }

    #[test]
    fn wire_message_as_str() {
        assert_eq!(WireMessage::Subscribe.as_str(), "subscribe");
        assert_eq!(WireMessage::Unsubscribe.as_str(), "unsubscribe");
        assert_eq!(WireMessage::Ping.as_str(), "ping");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_event_received(EventType::Ticker);
        record_event_dropped("unknown_market");
        record_wire_message(WireMessage::Ping);
        set_connection_state(ConnectionState::Connected);
        record_processing_duration(EventType::OrderBook, Duration::from_millis(1));
    }
}
