//! Stream Connection
//!
//! Owns the single socket to the exchange and everything attached to it:
//! lifecycle, keepalive ping, inbound dispatch, and the subscribe /
//! unsubscribe wire calls.
//!
//! # State Machine
//!
//! ```text
//! Disconnected --start()--> Connecting --Opened--> Connected
//!      ^                         |                     |
//!      +------ Closed/Errored ---+---------------------+
//! ```
//!
//! Reconnection is demand-driven: a close resets the bookkeeping, and the
//! next subscribe (or an explicit `start()`) opens a new socket. After
//! `stop()` only an explicit `start()` opens one; subscribes made in between
//! are held and flushed once that socket opens.
//!
//! # Generations
//!
//! Every `start()` opens a new session with a higher generation number.
//! Events from an older session, or from a session already stopped, are
//! ignored.
//!
//! All state lives behind one mutex. The ping callback checks state and
//! generation under that same lock, so no ping goes out once `stop()`
//! returns.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::application::ports::{SubscriptionPort, Transport, TransportEvent, TransportHandle};
use crate::domain::market::MarketId;
use crate::domain::streaming::ConnectionState;
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::exchange::codec::JsonCodec;
use crate::infrastructure::exchange::keepalive::KeepaliveState;
use crate::infrastructure::exchange::messages::OutboundMessage;
use crate::infrastructure::exchange::processor::EventProcessor;
use crate::infrastructure::metrics::{self, WireMessage};
use crate::infrastructure::scheduler::{self, TimerHandle};

#[derive(Default)]
struct ConnectionInner {
    state: ConnectionState,
    generation: u64,
    handle: Option<Box<dyn TransportHandle>>,
    /// Markets with open interest, sent or deferred.
    subscribed: HashSet<MarketId>,
    /// Subscribed markets whose wire message waits for `Opened`.
    pending: BTreeSet<MarketId>,
    keepalive: Option<TimerHandle>,
    /// Set by `stop()`, cleared by `start()`. Subscribes never connect while set.
    stopped: bool,
}

impl ConnectionInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state != ConnectionState::Disconnected
    }
}

/// The single streaming connection to the exchange.
pub struct StreamConnection {
    me: Weak<Self>,
    transport: Arc<dyn Transport>,
    processor: Arc<EventProcessor>,
    settings: StreamSettings,
    codec: JsonCodec,
    inner: Mutex<ConnectionInner>,
}

impl StreamConnection {
    /// Create a disconnected connection.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        processor: Arc<EventProcessor>,
        settings: StreamSettings,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            transport,
            processor,
            settings,
            codec: JsonCodec::new(),
            inner: Mutex::new(ConnectionInner::default()),
        })
    }

    /// Open the socket. No-op unless disconnected.
    ///
    /// Also lifts a previous `stop()`, so demand can reconnect again.
    pub fn start(&self) {
        let mut inner = self.inner.lock();
        inner.stopped = false;
        self.start_locked(&mut inner);
    }

    /// Unsubscribe everything, cancel the keepalive, close the socket.
    ///
    /// Safe from any state; a second call does nothing. Until the next
    /// `start()`, subscribes are recorded but open no socket.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.stopped = true;
        if inner.state == ConnectionState::Disconnected && inner.handle.is_none() {
            return;
        }

        if inner.state == ConnectionState::Connected {
            let sent: Vec<MarketId> = inner
                .subscribed
                .iter()
                .filter(|id| !inner.pending.contains(*id))
                .cloned()
                .collect();
            for id in sent {
                self.send_locked(&inner, &self.unsubscribe_message(id));
            }
        }

        if let Some(handle) = inner.handle.as_ref() {
            handle.close();
        }
        tracing::info!(generation = inner.generation, "Stream connection stopped");
        Self::reset_locked(&mut inner);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Generation of the most recent session.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Number of subscribe messages waiting for the socket to open.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Shared keepalive counters.
    #[must_use]
    pub fn keepalive(&self) -> &Arc<KeepaliveState> {
        self.processor.keepalive()
    }

    fn start_locked(&self, inner: &mut ConnectionInner) {
        if inner.state != ConnectionState::Disconnected {
            return;
        }

        inner.generation += 1;
        let generation = inner.generation;
        inner.state = ConnectionState::Connecting;
        metrics::set_connection_state(inner.state);

        let (event_tx, event_rx) = mpsc::channel(self.settings.event_buffer);
        inner.handle = Some(self.transport.connect(event_tx));
        tokio::spawn(Self::dispatch(self.me.clone(), generation, event_rx));

        tracing::info!(generation, url = %self.settings.url, "Connecting to exchange stream");
    }

    /// Deliver one session's events in arrival order.
    async fn dispatch(
        me: Weak<Self>,
        generation: u64,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            let Some(connection) = me.upgrade() else {
                break;
            };
            match event {
                TransportEvent::Opened => connection.on_opened(generation),
                TransportEvent::Message(text) => {
                    if connection.inner.lock().is_current(generation) {
                        connection.processor.process(&text).await;
                    }
                }
                TransportEvent::Closed { reason } => {
                    connection.on_closed(generation, &reason);
                    break;
                }
                TransportEvent::Errored(error) => {
                    connection.on_closed(generation, &error);
                    break;
                }
            }
        }
        tracing::debug!(generation, "Stream dispatch ended");
    }

    fn on_opened(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            tracing::debug!(generation, "Ignoring open from stale session");
            return;
        }

        inner.state = ConnectionState::Connected;
        metrics::set_connection_state(inner.state);

        let pending = std::mem::take(&mut inner.pending);
        for id in pending {
            self.send_locked(&inner, &self.subscribe_message(id));
        }

        let me = self.me.clone();
        inner.keepalive = Some(scheduler::every(
            self.settings.keepalive_interval,
            move || {
                if let Some(connection) = me.upgrade() {
                    connection.send_ping(generation);
                }
            },
        ));

        tracing::info!(
            generation,
            subscriptions = inner.subscribed.len(),
            "Exchange stream connected"
        );
    }

    fn on_closed(&self, generation: u64, reason: &str) {
        let mut inner = self.inner.lock();
        if !inner.is_current(generation) {
            tracing::debug!(generation, reason, "Ignoring close from stale session");
            return;
        }

        tracing::warn!(
            generation,
            reason,
            dropped_subscriptions = inner.subscribed.len(),
            "Exchange stream closed, reconnecting on next demand"
        );
        Self::reset_locked(&mut inner);
    }

    fn send_ping(&self, generation: u64) {
        let inner = self.inner.lock();
        if inner.generation != generation || inner.state != ConnectionState::Connected {
            return;
        }
        if self.send_locked(&inner, &OutboundMessage::Ping) {
            self.processor.keepalive().record_ping();
        }
    }

    fn reset_locked(inner: &mut ConnectionInner) {
        if let Some(keepalive) = inner.keepalive.take() {
            keepalive.cancel();
        }
        inner.handle = None;
        inner.subscribed.clear();
        inner.pending.clear();
        inner.state = ConnectionState::Disconnected;
        metrics::set_connection_state(inner.state);
        metrics::set_subscriptions(0);
    }

    fn subscribe_message(&self, id: MarketId) -> OutboundMessage {
        OutboundMessage::Subscribe {
            id,
            name: self.settings.channel.as_str(),
            limit: self.settings.subscription_limit(),
        }
    }

    fn unsubscribe_message(&self, id: MarketId) -> OutboundMessage {
        OutboundMessage::Unsubscribe {
            id,
            name: self.settings.channel.as_str(),
        }
    }

    /// Encode and queue a frame on the current session.
    fn send_locked(&self, inner: &ConnectionInner, message: &OutboundMessage) -> bool {
        let Some(handle) = inner.handle.as_ref() else {
            return false;
        };

        let frame = match self.codec.encode(message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode outbound message");
                return false;
            }
        };

        match handle.send(frame) {
            Ok(()) => {
                metrics::record_wire_message(match message {
                    OutboundMessage::Subscribe { .. } => WireMessage::Subscribe,
                    OutboundMessage::Unsubscribe { .. } => WireMessage::Unsubscribe,
                    OutboundMessage::Ping => WireMessage::Ping,
                });
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, generation = inner.generation, "Outbound frame not sent");
                false
            }
        }
    }
}

impl SubscriptionPort for StreamConnection {
    fn subscribed(&self) -> HashSet<MarketId> {
        self.inner.lock().subscribed.clone()
    }

    fn subscribe(&self, market: &MarketId) {
        let mut inner = self.inner.lock();
        if !inner.subscribed.insert(market.clone()) {
            return;
        }

        if inner.state == ConnectionState::Connected {
            self.send_locked(&inner, &self.subscribe_message(market.clone()));
        } else {
            inner.pending.insert(market.clone());
            if inner.stopped {
                tracing::debug!(
                    market_id = %market,
                    "Connection stopped, holding subscribe until start"
                );
                return;
            }
            tracing::debug!(market_id = %market, "Deferring subscribe until connected");
            self.start_locked(&mut inner);
        }
    }

    fn unsubscribe(&self, market: &MarketId) {
        let mut inner = self.inner.lock();
        if !inner.subscribed.remove(market) {
            return;
        }
        if inner.pending.remove(market) {
            return;
        }
        if inner.state == ConnectionState::Connected {
            self.send_locked(&inner, &self.unsubscribe_message(market.clone()));
        }
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StreamConnection")
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .field("subscribed", &inner.subscribed.len())
            .field("pending", &inner.pending.len())
            .finish_non_exhaustive()
    }
}
