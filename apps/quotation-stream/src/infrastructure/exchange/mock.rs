//! Mock Exchange Adapters
//!
//! In-memory `Transport` and `CatalogSource` implementations for tests and
//! local runs without exchange access.
//!
//! `MockTransport` records every frame the connection sends and lets the
//! caller drive the session: open it, deliver inbound frames, close it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::application::ports::{
    CatalogError, CatalogSource, Transport, TransportError, TransportEvent, TransportHandle,
};
use crate::domain::market::MarketDescriptor;

// =============================================================================
// Mock Transport
// =============================================================================

struct MockSession {
    events: mpsc::Sender<TransportEvent>,
    closed: Arc<AtomicBool>,
}

/// Scriptable transport that records outbound frames.
#[derive(Default)]
pub struct MockTransport {
    sessions: Mutex<Vec<MockSession>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Create a transport with no sessions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `connect` was called.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Report the latest session as open.
    pub async fn open(&self) {
        self.emit(TransportEvent::Opened).await;
    }

    /// Deliver an inbound text frame on the latest session.
    pub async fn deliver(&self, text: &str) {
        self.emit(TransportEvent::Message(text.to_string())).await;
    }

    /// Close the latest session from the server side.
    pub async fn close(&self, reason: &str) {
        self.emit(TransportEvent::Closed {
            reason: reason.to_string(),
        })
        .await;
    }

    /// Fail the latest session.
    pub async fn error(&self, error: &str) {
        self.emit(TransportEvent::Errored(error.to_string())).await;
    }

    /// Every frame sent so far, across sessions.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Every frame sent so far, parsed as JSON. Unparsable frames are skipped.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    /// Forget recorded frames.
    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    /// Check whether the latest session was closed by the client.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sessions
            .lock()
            .last()
            .is_some_and(|session| session.closed.load(Ordering::SeqCst))
    }

    async fn emit(&self, event: TransportEvent) {
        let sender = self
            .sessions
            .lock()
            .last()
            .map(|session| session.events.clone());
        match sender {
            Some(sender) => {
                if sender.send(event).await.is_err() {
                    tracing::debug!("Mock session receiver dropped");
                }
            }
            None => tracing::debug!("Mock transport has no session"),
        }
    }
}

impl Transport for MockTransport {
    fn connect(&self, events: mpsc::Sender<TransportEvent>) -> Box<dyn TransportHandle> {
        let closed = Arc::new(AtomicBool::new(false));
        self.sessions.lock().push(MockSession {
            events,
            closed: Arc::clone(&closed),
        });
        Box::new(MockHandle {
            sent: Arc::clone(&self.sent),
            closed,
        })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("sessions", &self.connect_count())
            .field("sent", &self.sent.lock().len())
            .finish()
    }
}

struct MockHandle {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl TransportHandle for MockHandle {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Static Catalog Source
// =============================================================================

/// Catalog source serving a fixed, replaceable market list.
#[derive(Debug, Default)]
pub struct StaticCatalogSource {
    markets: Mutex<Vec<MarketDescriptor>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl StaticCatalogSource {
    /// Create a source serving `markets`.
    #[must_use]
    pub fn new(markets: Vec<MarketDescriptor>) -> Self {
        Self {
            markets: Mutex::new(markets),
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Replace the served markets.
    pub fn set_markets(&self, markets: Vec<MarketDescriptor>) {
        *self.markets.lock() = markets;
    }

    /// Make subsequent fetches fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches served or failed.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch_markets(&self) -> Result<Vec<MarketDescriptor>, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Status {
                status: 503,
                body: "catalog unavailable".to_string(),
            });
        }
        Ok(self.markets.lock().clone())
    }
}
