//! Subscription Manager
//!
//! Single writer of the connection's subscription set. Each `sync` diffs
//! the wanted markets against what the connection currently subscribes to
//! and issues one wire call per changed market.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::application::ports::SubscriptionPort;
use crate::domain::market::MarketId;
use crate::domain::subscription::SubscriptionChanges;
use crate::infrastructure::metrics;

/// Drives subscribe/unsubscribe calls so the connection tracks demand.
pub struct SubscriptionManager {
    port: Arc<dyn SubscriptionPort>,
    sync_lock: Mutex<()>,
}

impl SubscriptionManager {
    /// Create a manager writing through `port`.
    #[must_use]
    pub fn new(port: Arc<dyn SubscriptionPort>) -> Self {
        Self {
            port,
            sync_lock: Mutex::new(()),
        }
    }

    /// Make the subscribed set equal `wanted`.
    ///
    /// Removals are sent before additions. Concurrent calls are serialized
    /// over the whole diff-and-send sequence.
    pub fn sync(&self, wanted: &HashSet<MarketId>) -> SubscriptionChanges {
        let _lock = self.sync_lock.lock();

        let subscribed = self.port.subscribed();
        let changes = SubscriptionChanges::between(wanted, &subscribed);
        if changes.is_empty() {
            return changes;
        }

        for market in &changes.unsubscribe {
            self.port.unsubscribe(market);
        }
        for market in &changes.subscribe {
            self.port.subscribe(market);
        }

        metrics::set_subscriptions(wanted.len());
        tracing::info!(
            added = changes.subscribe.len(),
            removed = changes.unsubscribe.len(),
            total = wanted.len(),
            "Subscriptions synced"
        );
        changes
    }

    /// Markets the connection currently subscribes to.
    #[must_use]
    pub fn subscribed(&self) -> HashSet<MarketId> {
        self.port.subscribed()
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("subscribed", &self.port.subscribed().len())
            .finish_non_exhaustive()
    }
}
