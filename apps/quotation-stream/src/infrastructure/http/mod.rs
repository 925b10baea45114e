//! HTTP Server
//!
//! Platform-facing HTTP surface over the quotation runtime.
//!
//! # Endpoints
//!
//! - `GET /quotations?quote=USD&bases=BTC,ETH` - cached quotes for the pairs
//! - `GET /markets` - catalog with derived trading rules
//! - `GET /health` - detailed status (JSON)
//! - `GET /healthz` - liveness probe
//! - `GET /readyz` - readiness probe (catalog loaded)
//! - `GET /metrics` - Prometheus metrics

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::market::{MarketDescriptor, TradingRules};
use crate::domain::quote::Quote;
use crate::domain::streaming::ConnectionState;
use crate::infrastructure::config::QuotationConfig;
use crate::infrastructure::exchange::KeepaliveSnapshot;
use crate::infrastructure::metrics::get_metrics_handle;
use crate::infrastructure::runtime::QuotationRuntime;

// =============================================================================
// Response Types
// =============================================================================

/// Detailed health response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_secs: u64,
    /// Current server time.
    pub current_time: DateTime<Utc>,
    /// Stream connection status.
    pub stream: StreamStatus,
    /// Market catalog status.
    pub catalog: CatalogStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Catalog loaded and every wanted market is being streamed.
    Healthy,
    /// Catalog loaded but subscriptions are waiting on the connection.
    Degraded,
    /// No catalog.
    Unhealthy,
}

/// Stream connection status.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    /// Connection state.
    pub state: ConnectionState,
    /// Connection generation.
    pub generation: u64,
    /// Markets currently subscribed.
    pub subscriptions: usize,
    /// Markets with demand inside the demand window.
    pub demanded: usize,
    /// Keepalive counters.
    pub keepalive: KeepaliveSnapshot,
}

/// Market catalog status.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStatus {
    /// Markets in the current snapshot.
    pub markets: usize,
    /// Time of the last successful refresh.
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// A catalog market with its derived trading rules.
#[derive(Debug, Clone, Serialize)]
pub struct MarketView {
    /// The catalog descriptor.
    #[serde(flatten)]
    pub market: MarketDescriptor,
    /// Rules derived with the base currency's precision.
    pub trading_rules: TradingRules,
}

/// Query parameters for `/quotations`.
#[derive(Debug, Deserialize)]
struct QuotationParams {
    quote: String,
    #[serde(default)]
    bases: String,
}

// =============================================================================
// HTTP Server
// =============================================================================

/// Shared state for the HTTP handlers.
#[derive(Debug)]
pub struct HttpState {
    version: String,
    started_at: Instant,
    runtime: Arc<QuotationRuntime>,
    config: Arc<QuotationConfig>,
}

impl HttpState {
    /// Create handler state.
    #[must_use]
    pub fn new(runtime: Arc<QuotationRuntime>, config: Arc<QuotationConfig>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            runtime,
            config,
        }
    }
}

/// Build the router for every endpoint.
#[must_use]
pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/quotations", get(quotations_handler))
        .route("/markets", get(markets_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// HTTP server bound to a port, stopped through a cancellation token.
pub struct HttpServer {
    port: u16,
    state: Arc<HttpState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new HTTP server.
    #[must_use]
    pub fn new(port: u16, state: HttpState, cancel: CancellationToken) -> Self {
        Self {
            port,
            state: Arc::new(state),
            cancel,
        }
    }

    /// Run the server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the server hits a
    /// fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn quotations_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<QuotationParams>,
) -> Json<Vec<Quote>> {
    let bases = split_bases(&params.bases);
    let quotes = state
        .runtime
        .query()
        .get_quotations(params.quote.trim(), &bases)
        .await;
    Json(quotes)
}

async fn markets_handler(State(state): State<Arc<HttpState>>) -> Json<Vec<MarketView>> {
    let markets = state
        .runtime
        .catalog()
        .current()
        .iter()
        .map(|market| MarketView {
            trading_rules: market
                .trading_rules(state.config.precision_for(&market.base_currency)),
            market: market.clone(),
        })
        .collect();
    Json(markets)
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    if state.runtime.catalog().is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    } else {
        (StatusCode::OK, "READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

/// Split a comma-separated base list, dropping blanks.
fn split_bases(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn build_health_response(state: &HttpState) -> HealthResponse {
    let runtime = &state.runtime;
    let connection = runtime.connection();

    let stream = StreamStatus {
        state: connection.state(),
        generation: connection.generation(),
        subscriptions: runtime.subscriptions().subscribed().len(),
        demanded: runtime.query().demand_len(),
        keepalive: connection.keepalive().snapshot(),
    };
    let catalog = CatalogStatus {
        markets: runtime.catalog().len(),
        last_refreshed_at: runtime.catalog().last_refreshed_at(),
    };

    HealthResponse {
        status: determine_health_status(&stream, &catalog),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        stream,
        catalog,
    }
}

/// The connection is demand-driven, so an idle disconnected stream is healthy.
const fn determine_health_status(stream: &StreamStatus, catalog: &CatalogStatus) -> HealthStatus {
    if catalog.markets == 0 {
        HealthStatus::Unhealthy
    } else if stream.subscriptions > 0 && !stream.state.is_connected() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
