//! Subscription Sync Property Tests
//!
//! `SubscriptionManager::sync` over arbitrary subscribed/wanted sets.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;

use quotation_stream::{MarketId, SubscriptionManager, SubscriptionPort};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Subscribe(MarketId),
    Unsubscribe(MarketId),
}

#[derive(Default)]
struct RecordingPort {
    subscribed: Mutex<HashSet<MarketId>>,
    calls: Mutex<Vec<Call>>,
}

impl SubscriptionPort for RecordingPort {
    fn subscribed(&self) -> HashSet<MarketId> {
        self.subscribed.lock().clone()
    }

    fn subscribe(&self, market: &MarketId) {
        self.subscribed.lock().insert(market.clone());
        self.calls.lock().push(Call::Subscribe(market.clone()));
    }

    fn unsubscribe(&self, market: &MarketId) {
        self.subscribed.lock().remove(market);
        self.calls.lock().push(Call::Unsubscribe(market.clone()));
    }
}

fn market_set() -> impl Strategy<Value = HashSet<MarketId>> {
    prop::collection::hash_set(0_u8..16, 0..10)
        .prop_map(|ids| ids.into_iter().map(|i| MarketId::new(format!("M{i}USD"))).collect())
}

proptest! {
    #[test]
    fn sync_converges_with_minimal_wire_calls(
        initial in market_set(),
        wanted in market_set(),
    ) {
        let port = Arc::new(RecordingPort::default());
        *port.subscribed.lock() = initial.clone();
        let manager = SubscriptionManager::new(Arc::clone(&port) as Arc<dyn SubscriptionPort>);

        let changes = manager.sync(&wanted);

        prop_assert_eq!(manager.subscribed(), wanted.clone());

        let calls = port.calls.lock().clone();
        let expected = initial.symmetric_difference(&wanted).count();
        prop_assert_eq!(calls.len(), expected);
        prop_assert_eq!(changes.len(), expected);

        // Removals go out before additions.
        let first_subscribe = calls
            .iter()
            .position(|c| matches!(c, Call::Subscribe(_)))
            .unwrap_or(calls.len());
        prop_assert!(calls[first_subscribe..]
            .iter()
            .all(|c| matches!(c, Call::Subscribe(_))));
    }

    #[test]
    fn second_sync_is_a_no_op(
        initial in market_set(),
        wanted in market_set(),
    ) {
        let port = Arc::new(RecordingPort::default());
        *port.subscribed.lock() = initial;
        let manager = SubscriptionManager::new(Arc::clone(&port) as Arc<dyn SubscriptionPort>);

        manager.sync(&wanted);
        let calls_after_first = port.calls.lock().len();
        let changes = manager.sync(&wanted);

        prop_assert!(changes.is_empty());
        prop_assert_eq!(port.calls.lock().len(), calls_after_first);
    }
}
