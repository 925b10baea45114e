//! Keepalive Tracking
//!
//! The exchange drops sockets that stay idle for about five seconds, so the
//! connection sends `{"type":"ping"}` on a fixed wall-clock period while
//! connected. Acks are counted but never reset the period.
//!
//! The ping loop itself is a `scheduler::every` timer owned by the
//! connection; this module holds the shared counters it and the event
//! processor update.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Counters shared between the ping timer and the event processor.
#[derive(Debug, Default)]
pub struct KeepaliveState {
    pings_sent: AtomicU64,
    acks_received: AtomicU64,
    last_ping_at: RwLock<Option<DateTime<Utc>>>,
    last_ack_at: RwLock<Option<DateTime<Utc>>>,
}

impl KeepaliveState {
    /// Create new keepalive state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a ping was sent.
    pub fn record_ping(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
        *self.last_ping_at.write() = Some(Utc::now());
    }

    /// Record that an ack was received.
    pub fn record_ack(&self) {
        self.acks_received.fetch_add(1, Ordering::Relaxed);
        *self.last_ack_at.write() = Some(Utc::now());
    }

    /// Total pings sent.
    #[must_use]
    pub fn pings_sent(&self) -> u64 {
        self.pings_sent.load(Ordering::Relaxed)
    }

    /// Total acks received.
    #[must_use]
    pub fn acks_received(&self) -> u64 {
        self.acks_received.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> KeepaliveSnapshot {
        KeepaliveSnapshot {
            pings_sent: self.pings_sent(),
            acks_received: self.acks_received(),
            last_ping_at: *self.last_ping_at.read(),
            last_ack_at: *self.last_ack_at.read(),
        }
    }
}

/// Serializable keepalive counters for the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeepaliveSnapshot {
    /// Total pings sent.
    pub pings_sent: u64,
    /// Total acks received.
    pub acks_received: u64,
    /// Time of the last ping.
    pub last_ping_at: Option<DateTime<Utc>>,
    /// Time of the last ack.
    pub last_ack_at: Option<DateTime<Utc>>,
}
