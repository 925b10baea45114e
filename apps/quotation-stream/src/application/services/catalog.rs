//! Market Catalog Service
//!
//! Owns the set of tradable markets. The snapshot is refreshed from a
//! `CatalogSource` on a schedule independent of the stream connection and
//! replaced wholesale on every successful refresh.
//!
//! A snapshot lives for the refresh interval plus a grace period, so a single
//! failed refresh never blanks the catalog.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::application::ports::{CatalogError, CatalogSource};
use crate::domain::market::{MarketDescriptor, MarketId};
use crate::infrastructure::config::CatalogSettings;
use crate::infrastructure::metrics;

#[derive(Debug)]
struct CatalogSnapshot {
    markets: Arc<Vec<MarketDescriptor>>,
    by_id: HashMap<MarketId, usize>,
    refreshed_at: DateTime<Utc>,
    expires_at: Instant,
}

impl CatalogSnapshot {
    fn new(markets: Vec<MarketDescriptor>, ttl: Duration) -> Self {
        let by_id = markets
            .iter()
            .enumerate()
            .map(|(index, market)| (market.id.clone(), index))
            .collect();
        Self {
            markets: Arc::new(markets),
            by_id,
            refreshed_at: Utc::now(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// Clears the in-flight flag when a refresh finishes or is dropped.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodically refreshed set of exchange markets.
pub struct MarketCatalog {
    source: Arc<dyn CatalogSource>,
    settings: CatalogSettings,
    snapshot: RwLock<Option<CatalogSnapshot>>,
    refreshing: AtomicBool,
}

impl MarketCatalog {
    /// Create an empty catalog backed by `source`.
    #[must_use]
    pub fn new(source: Arc<dyn CatalogSource>, settings: CatalogSettings) -> Self {
        Self {
            source,
            settings,
            snapshot: RwLock::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    /// Fetch the catalog and replace the snapshot.
    ///
    /// If another refresh is in flight, no request is sent and the current
    /// snapshot is returned.
    ///
    /// # Errors
    ///
    /// Returns the source error if the fetch fails. The previous snapshot is
    /// kept in that case.
    pub async fn refresh(&self) -> Result<Arc<Vec<MarketDescriptor>>, CatalogError> {
        if self.refreshing.swap(true, Ordering::AcqRel) {
            tracing::debug!("Catalog refresh already in flight, skipping");
            return Ok(self.current());
        }
        let _guard = RefreshGuard(&self.refreshing);

        match self.source.fetch_markets().await {
            Ok(markets) => {
                let snapshot = CatalogSnapshot::new(markets, self.settings.snapshot_ttl());
                let markets = Arc::clone(&snapshot.markets);
                *self.snapshot.write() = Some(snapshot);

                metrics::record_catalog_refresh(true);
                metrics::set_catalog_markets(markets.len());
                tracing::info!(markets = markets.len(), "Market catalog refreshed");
                Ok(markets)
            }
            Err(e) => {
                metrics::record_catalog_refresh(false);
                tracing::warn!(
                    error = %e,
                    retry_in_secs = self.settings.retry_interval.as_secs(),
                    "Market catalog refresh failed, keeping previous snapshot"
                );
                Err(e)
            }
        }
    }

    /// Run one scheduled refresh and return the delay until the next one.
    ///
    /// A failure shortens the delay to the retry interval.
    pub async fn refresh_cycle(&self) -> Duration {
        match self.refresh().await {
            Ok(_) => self.settings.refresh_interval,
            Err(_) => self.settings.retry_interval,
        }
    }

    /// Markets from the last successful refresh, or empty once it expired.
    #[must_use]
    pub fn current(&self) -> Arc<Vec<MarketDescriptor>> {
        self.snapshot
            .read()
            .as_ref()
            .filter(|snapshot| snapshot.is_live())
            .map_or_else(|| Arc::new(Vec::new()), |snapshot| Arc::clone(&snapshot.markets))
    }

    /// Look up a market by its exchange id.
    #[must_use]
    pub fn find(&self, id: &MarketId) -> Option<MarketDescriptor> {
        let guard = self.snapshot.read();
        let snapshot = guard.as_ref().filter(|snapshot| snapshot.is_live())?;
        snapshot
            .by_id
            .get(id)
            .and_then(|&index| snapshot.markets.get(index))
            .cloned()
    }

    /// Look up the market pricing `base` in `quote`, ignoring ASCII case.
    ///
    /// A tradable listing wins over a non-tradable one for the same pair.
    #[must_use]
    pub fn find_by_base_and_quote(&self, base: &str, quote: &str) -> Option<MarketDescriptor> {
        let markets = self.current();
        let mut candidates = markets.iter().filter(|m| m.matches_pair(base, quote));
        let first = candidates.next()?;
        if first.tradable {
            return Some(first.clone());
        }
        Some(candidates.find(|m| m.tradable).unwrap_or(first).clone())
    }

    /// Number of markets in the live snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current().len()
    }

    /// Check if the live snapshot holds no markets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time of the last successful refresh.
    #[must_use]
    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().as_ref().map(|s| s.refreshed_at)
    }
}

impl std::fmt::Debug for MarketCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketCatalog")
            .field("markets", &self.len())
            .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
