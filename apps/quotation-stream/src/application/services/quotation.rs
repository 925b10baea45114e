//! Quotation Query Service
//!
//! Public entry point for the rest of the platform. Resolves currency pairs
//! against the catalog, makes sure the stream covers them, and answers from
//! the quote cache without waiting on the network.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::application::ports::{QuoteCache, TtlCache};
use crate::application::services::{MarketCatalog, SubscriptionManager};
use crate::domain::market::MarketId;
use crate::domain::quote::Quote;
use crate::domain::subscription::{DemandTracker, SubscriptionChanges};

/// Answers quotation requests from the cache and drives subscriptions.
pub struct QuotationQueryService {
    catalog: Arc<MarketCatalog>,
    subscriptions: Arc<SubscriptionManager>,
    cache: Arc<QuoteCache>,
    demand: Mutex<DemandTracker>,
}

impl QuotationQueryService {
    /// Create the service.
    #[must_use]
    pub fn new(
        catalog: Arc<MarketCatalog>,
        subscriptions: Arc<SubscriptionManager>,
        cache: Arc<QuoteCache>,
        demand: DemandTracker,
    ) -> Self {
        Self {
            catalog,
            subscriptions,
            cache,
            demand: Mutex::new(demand),
        }
    }

    /// Latest quotes for each base currency priced in `quote_currency`.
    ///
    /// Pairs without a tradable market are skipped. Markets with no cached
    /// quote yet are omitted; the first request for a market subscribes it so
    /// a later call finds a value.
    pub async fn get_quotations(
        &self,
        quote_currency: &str,
        base_currencies: &[String],
    ) -> Vec<Quote> {
        let mut seen = HashSet::new();
        let requested: Vec<MarketId> = base_currencies
            .iter()
            .filter_map(|base| self.catalog.find_by_base_and_quote(base, quote_currency))
            .filter(|market| market.tradable)
            .map(|market| market.id)
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if requested.is_empty() {
            tracing::debug!(
                quote = quote_currency,
                bases = base_currencies.len(),
                "No tradable markets for requested pairs"
            );
        } else {
            self.sync_demand(Some(&requested));
        }

        let mut quotes = Vec::with_capacity(requested.len());
        for id in &requested {
            if let Some(quote) = self.cache.get(id).await {
                quotes.push(quote);
            }
        }
        quotes
    }

    /// Unsubscribe markets nobody requested within the demand window.
    pub fn release_idle(&self) -> SubscriptionChanges {
        let changes = self.sync_demand(None);
        if !changes.unsubscribe.is_empty() {
            tracing::info!(
                released = changes.unsubscribe.len(),
                "Released idle market subscriptions"
            );
        }
        changes
    }

    /// Number of markets inside the demand window.
    #[must_use]
    pub fn demand_len(&self) -> usize {
        self.demand.lock().len()
    }

    /// Record demand and sync subscriptions to the union of live demand.
    ///
    /// The demand lock is held through `sync` so concurrent callers apply
    /// their wanted sets in the order they were computed.
    fn sync_demand(&self, requested: Option<&[MarketId]>) -> SubscriptionChanges {
        let now = tokio::time::Instant::now().into_std();
        let mut demand = self.demand.lock();
        if let Some(requested) = requested {
            demand.record(requested.iter().cloned(), now);
        }
        let wanted: HashSet<MarketId> = demand
            .active(now)
            .into_iter()
            .filter(|id| self.catalog.find(id).is_some())
            .collect();
        self.subscriptions.sync(&wanted)
    }
}

impl std::fmt::Debug for QuotationQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotationQueryService")
            .field("catalog", &self.catalog)
            .field("demand", &self.demand_len())
            .finish_non_exhaustive()
    }
}
