//! Quotation Runtime
//!
//! Explicit composition of the quotation components in dependency order,
//! plus the lifecycle that owns their background timers:
//!
//! - catalog refresh loop (`scheduler::adaptive`, interval or retry delay)
//! - idle-demand sweep (`scheduler::every`, one demand window)
//! - the stream connection itself
//!
//! `stop()` cancels every timer and stops the connection. It is idempotent.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::application::ports::{CatalogSource, QuoteCache, SubscriptionPort, Transport};
use crate::application::services::{MarketCatalog, QuotationQueryService, SubscriptionManager};
use crate::domain::subscription::DemandTracker;
use crate::infrastructure::config::QuotationConfig;
use crate::infrastructure::exchange::{EventProcessor, KeepaliveState, StreamConnection};
use crate::infrastructure::scheduler::{self, TimerHandle};

/// The wired quotation subsystem.
pub struct QuotationRuntime {
    catalog: Arc<MarketCatalog>,
    connection: Arc<StreamConnection>,
    subscriptions: Arc<SubscriptionManager>,
    query: Arc<QuotationQueryService>,
    demand_window: Duration,
    timers: Mutex<Vec<TimerHandle>>,
}

impl QuotationRuntime {
    /// Wire every component. Nothing runs until `start()`.
    #[must_use]
    pub fn new(
        config: &QuotationConfig,
        catalog_source: Arc<dyn CatalogSource>,
        transport: Arc<dyn Transport>,
        cache: Arc<QuoteCache>,
    ) -> Self {
        let catalog = Arc::new(MarketCatalog::new(catalog_source, config.catalog.clone()));

        let processor = Arc::new(EventProcessor::new(
            Arc::clone(&catalog),
            Arc::clone(&cache),
            Arc::new(KeepaliveState::new()),
            config.cache.quote_ttl,
        ));
        let connection = StreamConnection::new(transport, processor, config.stream.clone());

        let subscriptions = Arc::new(SubscriptionManager::new(
            Arc::clone(&connection) as Arc<dyn SubscriptionPort>
        ));
        let query = Arc::new(QuotationQueryService::new(
            Arc::clone(&catalog),
            Arc::clone(&subscriptions),
            cache,
            DemandTracker::new(config.cache.demand_window),
        ));

        Self {
            catalog,
            connection,
            subscriptions,
            query,
            demand_window: config.cache.demand_window,
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Start the catalog loop, the idle sweep, and the connection.
    ///
    /// Calling `start` on a running runtime does nothing.
    pub fn start(&self) {
        let mut timers = self.timers.lock();
        if !timers.is_empty() {
            return;
        }

        let catalog = Arc::clone(&self.catalog);
        timers.push(scheduler::adaptive(Duration::ZERO, move || {
            let catalog = Arc::clone(&catalog);
            async move { catalog.refresh_cycle().await }
        }));

        let query = Arc::clone(&self.query);
        timers.push(scheduler::every(self.demand_window, move || {
            query.release_idle();
        }));

        self.connection.start();
        tracing::info!(
            demand_window_secs = self.demand_window.as_secs(),
            "Quotation runtime started"
        );
    }

    /// Cancel every timer and stop the connection.
    pub fn stop(&self) {
        let timers = std::mem::take(&mut *self.timers.lock());
        let was_running = !timers.is_empty();
        for timer in timers {
            timer.cancel();
        }
        self.connection.stop();
        if was_running {
            tracing::info!("Quotation runtime stopped");
        }
    }

    /// Check whether `start` ran and `stop` has not.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.timers.lock().is_empty()
    }

    /// The market catalog.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<MarketCatalog> {
        &self.catalog
    }

    /// The stream connection.
    #[must_use]
    pub const fn connection(&self) -> &Arc<StreamConnection> {
        &self.connection
    }

    /// The subscription manager.
    #[must_use]
    pub const fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// The quotation query service.
    #[must_use]
    pub const fn query(&self) -> &Arc<QuotationQueryService> {
        &self.query
    }
}

impl std::fmt::Debug for QuotationRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotationRuntime")
            .field("connection", &self.connection)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
