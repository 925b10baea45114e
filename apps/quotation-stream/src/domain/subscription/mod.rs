//! Subscription Management Types
//!
//! Domain types for deciding which markets the stream connection should
//! hold open interest in.
//!
//! # Design
//!
//! - `SubscriptionChanges` is the set diff between the markets callers want
//!   and the markets the connection currently subscribes to.
//! - `DemandTracker` remembers when each market was last requested, so the
//!   wanted set is the union of every caller's recent interest rather than
//!   whatever the latest caller asked for.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::domain::market::MarketId;

// =============================================================================
// Subscription Changes
// =============================================================================

/// Changes to upstream subscriptions.
///
/// Sets are ordered so wire messages go out in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionChanges {
    /// Markets to subscribe to.
    pub subscribe: BTreeSet<MarketId>,
    /// Markets to unsubscribe from.
    pub unsubscribe: BTreeSet<MarketId>,
}

impl SubscriptionChanges {
    /// Diff the wanted set against the currently subscribed set.
    #[must_use]
    pub fn between(wanted: &HashSet<MarketId>, subscribed: &HashSet<MarketId>) -> Self {
        Self {
            subscribe: wanted.difference(subscribed).cloned().collect(),
            unsubscribe: subscribed.difference(wanted).cloned().collect(),
        }
    }

    /// Check if there are any changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }

    /// Number of wire calls needed to apply the changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribe.len() + self.unsubscribe.len()
    }
}

// =============================================================================
// Demand Tracking
// =============================================================================

/// Tracks recent interest in markets across all callers.
///
/// A market stays wanted for `window` after its last request.
#[derive(Debug)]
pub struct DemandTracker {
    window: Duration,
    last_requested: HashMap<MarketId, Instant>,
}

impl DemandTracker {
    /// Create a tracker with the given demand window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_requested: HashMap::new(),
        }
    }

    /// Record that the given markets were requested at `now`.
    pub fn record(&mut self, markets: impl IntoIterator<Item = MarketId>, now: Instant) {
        for market in markets {
            self.last_requested.insert(market, now);
        }
    }

    /// Markets requested within the window, pruning the ones that aged out.
    pub fn active(&mut self, now: Instant) -> HashSet<MarketId> {
        let window = self.window;
        self.last_requested
            .retain(|_, requested_at| now.saturating_duration_since(*requested_at) <= window);
        self.last_requested.keys().cloned().collect()
    }

    /// Number of markets currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_requested.len()
    }

    /// Check if no market is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_requested.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> HashSet<MarketId> {
        items.iter().map(|s| MarketId::new(*s)).collect()
    }

    #[test]
    fn changes_between_disjoint_sets() {
        let changes = SubscriptionChanges::between(&ids(&["BTCUSD"]), &ids(&["ETHUSD"]));

        assert!(changes.subscribe.contains(&MarketId::new("BTCUSD")));
        assert!(changes.unsubscribe.contains(&MarketId::new("ETHUSD")));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn changes_between_equal_sets_is_empty() {
        let set = ids(&["BTCUSD", "ETHUSD"]);
        let changes = SubscriptionChanges::between(&set, &set);

        assert!(changes.is_empty());
        assert_eq!(changes.len(), 0);
    }

    #[test]
    fn changes_only_touch_the_symmetric_difference() {
        let changes = SubscriptionChanges::between(
            &ids(&["BTCUSD", "ETHUSD", "LTCUSD"]),
            &ids(&["ETHUSD", "XRPUSD"]),
        );

        assert_eq!(
            changes.subscribe.iter().map(MarketId::as_str).collect::<Vec<_>>(),
            vec!["BTCUSD", "LTCUSD"]
        );
        assert_eq!(
            changes.unsubscribe.iter().map(MarketId::as_str).collect::<Vec<_>>(),
            vec!["XRPUSD"]
        );
    }

    #[test]
    fn demand_unions_callers() {
        let now = Instant::now();
        let mut demand = DemandTracker::new(Duration::from_secs(60));

        demand.record(ids(&["BTCUSD"]), now);
        demand.record(ids(&["ETHUSD"]), now);

        assert_eq!(demand.active(now), ids(&["BTCUSD", "ETHUSD"]));
    }

    #[test]
    fn demand_expires_after_window() {
        let start = Instant::now();
        let mut demand = DemandTracker::new(Duration::from_secs(60));

        demand.record(ids(&["BTCUSD"]), start);
        demand.record(ids(&["ETHUSD"]), start + Duration::from_secs(50));

        let active = demand.active(start + Duration::from_secs(90));
        assert_eq!(active, ids(&["ETHUSD"]));
        assert_eq!(demand.len(), 1);
    }

    #[test]
    fn repeated_request_extends_demand() {
        let start = Instant::now();
        let mut demand = DemandTracker::new(Duration::from_secs(60));

        demand.record(ids(&["BTCUSD"]), start);
        demand.record(ids(&["BTCUSD"]), start + Duration::from_secs(55));

        assert!(!demand.active(start + Duration::from_secs(100)).is_empty());
    }
}
