//! Quotation Stream Binary
//!
//! Starts the exchange quotation service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quotation-stream
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `EXCHANGE_STREAM_URL`: Exchange WebSocket endpoint (`ws://` or `wss://`)
//! - `EXCHANGE_CATALOG_URL`: Exchange market catalog endpoint (`http://` or `https://`)
//!
//! ## Optional
//! - `QUOTATION_HTTP_PORT`: HTTP port (default: 8083)
//! - `QUOTATION_QUOTE_CHANNEL`: `ticker` | `orderbook` (default: orderbook)
//! - `QUOTATION_QUOTE_TTL_SECS`: Quote freshness window (default: 60)
//! - `QUOTATION_DEMAND_WINDOW_SECS`: How long a request keeps a market subscribed (default: 300)
//! - `QUOTATION_CURRENCY_PRECISION`: Base precisions, e.g. `BTC:8,ETH:18`
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use quotation_stream::application::ports::{CatalogSource, QuoteCache, Transport};
use quotation_stream::infrastructure::scheduler;
use quotation_stream::infrastructure::telemetry;
use quotation_stream::{
    HttpCatalogSource, HttpServer, HttpState, InMemoryTtlCache, MarketId, QuotationConfig,
    QuotationRuntime, Quote, WsTransport, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout for the HTTP server.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Quotation Stream");

    let _metrics_handle = init_metrics()?;

    let config = Arc::new(QuotationConfig::from_env()?);
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let catalog_source: Arc<dyn CatalogSource> = Arc::new(
        HttpCatalogSource::new(&config.catalog).context("failed to build catalog client")?,
    );
    let transport: Arc<dyn Transport> = Arc::new(WsTransport::new(config.stream.url.clone()));
    let cache = Arc::new(InMemoryTtlCache::<MarketId, Quote>::new());

    let runtime = Arc::new(QuotationRuntime::new(
        &config,
        catalog_source,
        transport,
        Arc::clone(&cache) as Arc<QuoteCache>,
    ));
    runtime.start();

    // Expiry is passive, so sweep dead entries for markets nobody reads.
    let purge_cache = Arc::clone(&cache);
    let _purge_timer = scheduler::every(config.cache.quote_ttl, move || {
        let purged = purge_cache.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Purged expired quotes");
        }
    });

    let http_server = HttpServer::new(
        config.server.http_port,
        HttpState::new(Arc::clone(&runtime), Arc::clone(&config)),
        shutdown_token.clone(),
    );
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!("Quotation stream ready");

    await_shutdown(shutdown_token).await;

    // Drain in-flight requests first so none of them re-subscribes after stop.
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, http_task).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "HTTP server did not stop in time"
        );
    }
    runtime.stop();

    tracing::info!("Quotation stream stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &QuotationConfig) {
    tracing::info!(
        channel = config.stream.channel.as_str(),
        http_port = config.server.http_port,
        quote_ttl_secs = config.cache.quote_ttl.as_secs(),
        demand_window_secs = config.cache.demand_window.as_secs(),
        catalog_refresh_secs = config.catalog.refresh_interval.as_secs(),
        "Configuration loaded"
    );
    tracing::debug!(
        stream_url = %config.stream.url,
        catalog_url = %config.catalog.url,
        "Exchange endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
