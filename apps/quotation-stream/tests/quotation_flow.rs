//! Quotation Flow Integration Tests
//!
//! Drives the wired runtime end to end over the mock transport and a static
//! catalog: demand-driven subscription, quote ingestion, expiry, idle
//! release, reconnect, and shutdown.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;

use quotation_stream::{
    CatalogSource, ConnectionState, InMemoryTtlCache, MarketDescriptor, MarketId, MockTransport,
    QuotationConfig, QuotationRuntime, Quote, QuoteCache, StaticCatalogSource, Transport,
};

struct Harness {
    runtime: QuotationRuntime,
    source: Arc<StaticCatalogSource>,
    transport: Arc<MockTransport>,
}

fn market(id: &str, base: &str, tradable: bool) -> MarketDescriptor {
    MarketDescriptor {
        id: MarketId::new(id),
        base_currency: base.to_string(),
        quote_currency: "USD".to_string(),
        price_scale: 100,
        min_movement: Decimal::new(1, 4),
        tradable,
    }
}

fn harness() -> Harness {
    let source = Arc::new(StaticCatalogSource::new(vec![
        market("BTCUSD", "BTC", true),
        market("ETHUSD", "ETH", true),
        market("XRPUSD", "XRP", false),
    ]));
    let transport = Arc::new(MockTransport::new());
    let config = QuotationConfig::new("wss://stream.test", "https://catalog.test");
    let cache: Arc<QuoteCache> = Arc::new(InMemoryTtlCache::<MarketId, Quote>::new());

    let runtime = QuotationRuntime::new(
        &config,
        Arc::clone(&source) as Arc<dyn CatalogSource>,
        Arc::clone(&transport) as Arc<dyn Transport>,
        cache,
    );
    Harness {
        runtime,
        source,
        transport,
    }
}

/// Let spawned tasks run under the paused clock.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn bases(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

async fn started() -> Harness {
    let h = harness();
    h.runtime.start();
    settle().await;
    assert_eq!(h.runtime.catalog().len(), 3);
    h
}

#[tokio::test(start_paused = true)]
async fn returns_only_pairs_with_cached_quotes() {
    let h = started().await;
    let query = Arc::clone(h.runtime.query());

    // First request subscribes; nothing is cached yet.
    let quotes = query.get_quotations("USD", &bases(&["BTC", "ETH"])).await;
    assert!(quotes.is_empty());

    h.transport.open().await;
    settle().await;
    assert_eq!(h.runtime.connection().state(), ConnectionState::Connected);

    let subscribes: Vec<_> = h
        .transport
        .sent_messages()
        .into_iter()
        .filter(|m| m["type"] == "subscribe")
        .collect();
    assert_eq!(subscribes.len(), 2);
    assert!(subscribes.contains(
        &json!({"type": "subscribe", "id": "BTCUSD", "name": "orderbook", "limit": 10})
    ));

    h.transport
        .deliver(
            r#"{"type":"orderbook","id":"BTCUSD","ts":1700000000000,"data":{"asks":[["10","1"],["12","1"]],"bids":[["9","3"],["5","1"]]}}"#,
        )
        .await;
    settle().await;

    let quotes = query.get_quotations("USD", &bases(&["BTC", "ETH"])).await;
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].market_id, MarketId::new("BTCUSD"));
    assert_eq!(quotes[0].ask, Decimal::new(11, 0));
    assert_eq!(quotes[0].bid, Decimal::new(8, 0));

    h.runtime.stop();
}

#[tokio::test(start_paused = true)]
async fn unknown_and_untradable_pairs_are_ignored() {
    let h = started().await;

    let quotes = h
        .runtime
        .query()
        .get_quotations("USD", &bases(&["XRP", "DOGE"]))
        .await;

    assert!(quotes.is_empty());
    assert!(h.runtime.subscriptions().subscribed().is_empty());

    h.runtime.stop();
}

#[tokio::test(start_paused = true)]
async fn quotes_expire_after_ttl() {
    let h = started().await;
    let query = Arc::clone(h.runtime.query());
    query.get_quotations("USD", &bases(&["BTC"])).await;
    h.transport.open().await;
    h.transport
        .deliver(r#"{"type":"ticker","id":"BTCUSD","data":{"buy":"100","sell":"99"}}"#)
        .await;
    settle().await;

    assert_eq!(query.get_quotations("USD", &bases(&["BTC"])).await.len(), 1);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(query.get_quotations("USD", &bases(&["BTC"])).await.is_empty());

    h.runtime.stop();
}

#[tokio::test(start_paused = true)]
async fn idle_markets_are_released_after_demand_window() {
    let h = started().await;
    h.runtime
        .query()
        .get_quotations("USD", &bases(&["BTC"]))
        .await;
    h.transport.open().await;
    settle().await;
    h.transport.clear_sent();

    tokio::time::sleep(Duration::from_secs(601)).await;

    assert!(h.runtime.subscriptions().subscribed().is_empty());
    assert!(
        h.transport
            .sent_messages()
            .contains(&json!({"type": "unsubscribe", "id": "BTCUSD", "name": "orderbook"}))
    );

    h.runtime.stop();
}

#[tokio::test(start_paused = true)]
async fn closed_stream_reconnects_on_next_demand() {
    let h = started().await;
    let query = Arc::clone(h.runtime.query());
    query.get_quotations("USD", &bases(&["BTC"])).await;
    h.transport.open().await;
    settle().await;

    h.transport.close("server restart").await;
    settle().await;
    assert_eq!(h.runtime.connection().state(), ConnectionState::Disconnected);
    assert!(h.runtime.subscriptions().subscribed().is_empty());

    query.get_quotations("USD", &bases(&["BTC"])).await;
    assert_eq!(h.transport.connect_count(), 2);
    assert_eq!(h.runtime.connection().state(), ConnectionState::Connecting);

    h.transport.clear_sent();
    h.transport.open().await;
    settle().await;
    assert!(h.transport.sent_messages().contains(
        &json!({"type": "subscribe", "id": "BTCUSD", "name": "orderbook", "limit": 10})
    ));

    h.runtime.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_silences_keepalive() {
    let h = started().await;
    h.runtime
        .query()
        .get_quotations("USD", &bases(&["BTC", "ETH"]))
        .await;
    h.transport.open().await;
    settle().await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(
        h.transport
            .sent_messages()
            .contains(&json!({"type": "ping"}))
    );

    h.runtime.stop();
    let after_first_stop = h.transport.sent_frames();
    h.runtime.stop();

    let unsubscribes = after_first_stop
        .iter()
        .filter(|frame| frame.contains("unsubscribe"))
        .count();
    assert_eq!(unsubscribes, 2);
    assert!(h.transport.is_closed());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.transport.sent_frames(), after_first_stop);
    assert_eq!(h.runtime.connection().state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn catalog_failure_keeps_previous_snapshot() {
    let h = started().await;
    h.source.set_failing(true);

    // Past the refresh interval: the refresh fails and retries.
    tokio::time::sleep(Duration::from_secs(3_601)).await;
    assert_eq!(h.source.fetch_count(), 2);
    assert_eq!(h.runtime.catalog().len(), 3);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.source.fetch_count(), 3);
    assert_eq!(h.runtime.catalog().len(), 3);

    h.source.set_failing(false);
    h.source.set_markets(vec![market("BTCUSD", "BTC", true)]);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.source.fetch_count(), 4);
    assert_eq!(h.runtime.catalog().len(), 1);
    assert!(h.runtime.catalog().last_refreshed_at().is_some());

    h.runtime.stop();
}

#[tokio::test(start_paused = true)]
async fn demand_after_stop_opens_nothing_until_restart() {
    let h = started().await;
    h.transport.open().await;
    settle().await;

    h.runtime.stop();
    let frames_at_stop = h.transport.sent_frames();

    // A request still in flight at shutdown.
    let quotes = h
        .runtime
        .query()
        .get_quotations("USD", &bases(&["BTC"]))
        .await;
    assert!(quotes.is_empty());
    h.transport.open().await;
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert_eq!(h.transport.connect_count(), 1);
    assert_eq!(h.runtime.connection().state(), ConnectionState::Disconnected);
    assert_eq!(h.transport.sent_frames(), frames_at_stop);
    assert!(!h.runtime.is_running());

    // Restarting picks the held demand back up.
    h.runtime.start();
    settle().await;
    assert_eq!(h.transport.connect_count(), 2);
    h.transport.open().await;
    settle().await;
    assert!(h.transport.sent_messages().contains(
        &json!({"type": "subscribe", "id": "BTCUSD", "name": "orderbook", "limit": 10})
    ));

    h.runtime.stop();
}

#[tokio::test(start_paused = true)]
async fn markets_leaving_the_catalog_are_unsubscribed() {
    let h = started().await;
    h.runtime
        .query()
        .get_quotations("USD", &bases(&["BTC", "ETH"]))
        .await;
    h.transport.open().await;
    settle().await;
    h.transport.clear_sent();

    h.source.set_markets(vec![market("BTCUSD", "BTC", true)]);
    h.runtime.catalog().refresh().await.unwrap();
    let changes = h.runtime.query().release_idle();

    assert!(changes.unsubscribe.contains(&MarketId::new("ETHUSD")));
    assert_eq!(
        h.transport.sent_messages(),
        vec![json!({"type": "unsubscribe", "id": "ETHUSD", "name": "orderbook"})]
    );
    let subscribed = h.runtime.subscriptions().subscribed();
    assert_eq!(subscribed, HashSet::from([MarketId::new("BTCUSD")]));
    assert!(
        subscribed
            .iter()
            .all(|id| h.runtime.catalog().find(id).is_some())
    );

    h.runtime.stop();
}
