//! Quotation Service Settings
//!
//! Configuration types for the quotation stream, loaded from environment
//! variables.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::streaming::QuoteChannel;

/// Base-currency precision used when none is configured.
pub const DEFAULT_CURRENCY_PRECISION: u32 = 8;

/// Stream connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Exchange streaming endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Channel subscribed for each market.
    pub channel: QuoteChannel,
    /// Depth requested on order-book subscriptions.
    pub orderbook_depth: u32,
    /// Fixed keepalive ping period.
    pub keepalive_interval: Duration,
    /// Capacity of the inbound transport event channel.
    pub event_buffer: usize,
}

impl StreamSettings {
    /// Create stream settings with defaults for everything but the URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            channel: QuoteChannel::default(),
            orderbook_depth: 10,
            keepalive_interval: Duration::from_millis(4_000),
            event_buffer: 1_024,
        }
    }

    /// Depth sent as `limit` on subscribe, if the channel takes one.
    #[must_use]
    pub const fn subscription_limit(&self) -> Option<u32> {
        match self.channel {
            QuoteChannel::OrderBook => Some(self.orderbook_depth),
            QuoteChannel::Ticker => None,
        }
    }
}

/// Market catalog settings.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Exchange catalog endpoint (`http://` or `https://`).
    pub url: String,
    /// Period between successful refreshes.
    pub refresh_interval: Duration,
    /// Delay before retrying a failed refresh.
    pub retry_interval: Duration,
    /// Extra lifetime of a snapshot beyond the refresh interval.
    pub ttl_grace: Duration,
    /// HTTP timeout for one catalog request.
    pub request_timeout: Duration,
}

impl CatalogSettings {
    /// Create catalog settings with defaults for everything but the URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            refresh_interval: Duration::from_secs(3_600),
            retry_interval: Duration::from_secs(10),
            ttl_grace: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Lifetime of a catalog snapshot.
    #[must_use]
    pub fn snapshot_ttl(&self) -> Duration {
        self.refresh_interval.saturating_add(self.ttl_grace)
    }
}

/// Quote cache and demand settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Freshness window of a cached quote.
    pub quote_ttl: Duration,
    /// How long one request keeps a market subscribed.
    pub demand_window: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            quote_ttl: Duration::from_secs(60),
            demand_window: Duration::from_secs(300),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// HTTP port for quotations, health checks and metrics.
    pub http_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { http_port: 8083 }
    }
}

/// Complete quotation service configuration.
#[derive(Debug, Clone)]
pub struct QuotationConfig {
    /// Stream connection settings.
    pub stream: StreamSettings,
    /// Market catalog settings.
    pub catalog: CatalogSettings,
    /// Quote cache and demand settings.
    pub cache: CacheSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Decimal precision per base currency, keyed by upper-case symbol.
    pub currency_precision: HashMap<String, u32>,
}

impl QuotationConfig {
    /// Create a configuration with defaults for the given endpoints.
    #[must_use]
    pub fn new(stream_url: impl Into<String>, catalog_url: impl Into<String>) -> Self {
        Self {
            stream: StreamSettings::new(stream_url),
            catalog: CatalogSettings::new(catalog_url),
            cache: CacheSettings::default(),
            server: ServerSettings::default(),
            currency_precision: HashMap::new(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing, empty,
    /// or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing, empty, or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stream_url = required(&lookup, "EXCHANGE_STREAM_URL")?;
        validate_scheme("EXCHANGE_STREAM_URL", &stream_url, &["ws://", "wss://"])?;

        let catalog_url = required(&lookup, "EXCHANGE_CATALOG_URL")?;
        validate_scheme(
            "EXCHANGE_CATALOG_URL",
            &catalog_url,
            &["http://", "https://"],
        )?;

        let mut config = Self::new(stream_url, catalog_url);

        let stream = &mut config.stream;
        if let Some(channel) = lookup("QUOTATION_QUOTE_CHANNEL") {
            stream.channel = QuoteChannel::from_str_case_insensitive(&channel);
        }
        stream.orderbook_depth = parse_or(
            &lookup,
            "QUOTATION_ORDERBOOK_DEPTH",
            stream.orderbook_depth,
        );
        stream.keepalive_interval = parse_millis_or(
            &lookup,
            "QUOTATION_KEEPALIVE_INTERVAL_MS",
            stream.keepalive_interval,
        );
        if stream.keepalive_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "QUOTATION_KEEPALIVE_INTERVAL_MS".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        stream.event_buffer =
            parse_or(&lookup, "QUOTATION_EVENT_BUFFER", stream.event_buffer).max(1);

        let catalog = &mut config.catalog;
        catalog.refresh_interval = parse_secs_or(
            &lookup,
            "QUOTATION_CATALOG_REFRESH_SECS",
            catalog.refresh_interval,
        );
        catalog.retry_interval = parse_secs_or(
            &lookup,
            "QUOTATION_CATALOG_RETRY_SECS",
            catalog.retry_interval,
        );
        catalog.ttl_grace = parse_secs_or(
            &lookup,
            "QUOTATION_CATALOG_TTL_GRACE_SECS",
            catalog.ttl_grace,
        );
        catalog.request_timeout = parse_secs_or(
            &lookup,
            "QUOTATION_CATALOG_TIMEOUT_SECS",
            catalog.request_timeout,
        );

        let cache = &mut config.cache;
        cache.quote_ttl = parse_secs_or(&lookup, "QUOTATION_QUOTE_TTL_SECS", cache.quote_ttl);
        cache.demand_window = parse_secs_or(
            &lookup,
            "QUOTATION_DEMAND_WINDOW_SECS",
            cache.demand_window,
        );

        config.server.http_port =
            parse_or(&lookup, "QUOTATION_HTTP_PORT", config.server.http_port);

        if let Some(raw) = lookup("QUOTATION_CURRENCY_PRECISION") {
            config.currency_precision = parse_currency_precision(&raw);
        }

        Ok(config)
    }

    /// Decimal precision of a base currency, defaulting to 8.
    #[must_use]
    pub fn precision_for(&self, currency: &str) -> u32 {
        self.currency_precision
            .get(&currency.to_ascii_uppercase())
            .copied()
            .unwrap_or(DEFAULT_CURRENCY_PRECISION)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable has an unusable value.
    #[error("environment variable {key} is invalid: {reason}")]
    Invalid {
        /// Variable name.
        key: String,
        /// What is wrong with the value.
        reason: String,
    },
}

/// Parse `BTC:8,ETH:18` into a per-currency precision map.
///
/// Malformed entries are skipped.
#[must_use]
pub fn parse_currency_precision(raw: &str) -> HashMap<String, u32> {
    raw.split(',')
        .filter_map(|entry| {
            let (currency, precision) = entry.split_once(':')?;
            let currency = currency.trim();
            if currency.is_empty() {
                return None;
            }
            let precision = precision.trim().parse().ok()?;
            Some((currency.to_ascii_uppercase(), precision))
        })
        .collect()
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn validate_scheme(key: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    if schemes.iter().any(|scheme| value.starts_with(scheme)) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("expected one of {}", schemes.join(", ")),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_secs_or<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_millis_or<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("EXCHANGE_STREAM_URL", "wss://stream.example.com/v1"),
        ("EXCHANGE_CATALOG_URL", "https://api.example.com/markets"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_set() {
        let config = QuotationConfig::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.stream.url, "wss://stream.example.com/v1");
        assert_eq!(config.stream.channel, QuoteChannel::OrderBook);
        assert_eq!(config.stream.orderbook_depth, 10);
        assert_eq!(config.stream.keepalive_interval, Duration::from_millis(4_000));
        assert_eq!(config.stream.event_buffer, 1_024);
        assert_eq!(config.catalog.refresh_interval, Duration::from_secs(3_600));
        assert_eq!(config.catalog.retry_interval, Duration::from_secs(10));
        assert_eq!(config.catalog.snapshot_ttl(), Duration::from_secs(3_900));
        assert_eq!(config.cache.quote_ttl, Duration::from_secs(60));
        assert_eq!(config.cache.demand_window, Duration::from_secs(300));
        assert_eq!(config.server.http_port, 8083);
        assert_eq!(config.precision_for("BTC"), 8);
    }

    #[test]
    fn missing_stream_url_is_rejected() {
        let err = QuotationConfig::from_lookup(lookup_from(&[REQUIRED[1]])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "EXCHANGE_STREAM_URL"));
    }

    #[test]
    fn empty_catalog_url_is_rejected() {
        let err = QuotationConfig::from_lookup(lookup_from(&[
            REQUIRED[0],
            ("EXCHANGE_CATALOG_URL", "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(key) if key == "EXCHANGE_CATALOG_URL"));
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        let err = QuotationConfig::from_lookup(lookup_from(&[
            ("EXCHANGE_STREAM_URL", "https://stream.example.com"),
            REQUIRED[1],
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "EXCHANGE_STREAM_URL"));
    }

    #[test]
    fn zero_keepalive_is_rejected() {
        let err = QuotationConfig::from_lookup(lookup_from(&[
            REQUIRED[0],
            REQUIRED[1],
            ("QUOTATION_KEEPALIVE_INTERVAL_MS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = QuotationConfig::from_lookup(lookup_from(&[
            REQUIRED[0],
            REQUIRED[1],
            ("QUOTATION_QUOTE_CHANNEL", "TICKER"),
            ("QUOTATION_KEEPALIVE_INTERVAL_MS", "2500"),
            ("QUOTATION_QUOTE_TTL_SECS", "15"),
            ("QUOTATION_HTTP_PORT", "9000"),
            ("QUOTATION_CURRENCY_PRECISION", "eth:18, BTC:8"),
        ]))
        .unwrap();

        assert_eq!(config.stream.channel, QuoteChannel::Ticker);
        assert_eq!(config.stream.subscription_limit(), None);
        assert_eq!(config.stream.keepalive_interval, Duration::from_millis(2_500));
        assert_eq!(config.cache.quote_ttl, Duration::from_secs(15));
        assert_eq!(config.server.http_port, 9000);
        assert_eq!(config.precision_for("ETH"), 18);
        assert_eq!(config.precision_for("eth"), 18);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = QuotationConfig::from_lookup(lookup_from(&[
            REQUIRED[0],
            REQUIRED[1],
            ("QUOTATION_ORDERBOOK_DEPTH", "deep"),
            ("QUOTATION_CATALOG_REFRESH_SECS", "-1"),
        ]))
        .unwrap();

        assert_eq!(config.stream.orderbook_depth, 10);
        assert_eq!(config.stream.subscription_limit(), Some(10));
        assert_eq!(config.catalog.refresh_interval, Duration::from_secs(3_600));
    }

    #[test]
    fn currency_precision_skips_malformed_entries() {
        let parsed = parse_currency_precision("BTC:8,bad,:4,DOGE:x,XRP:6");

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("BTC"), Some(&8));
        assert_eq!(parsed.get("XRP"), Some(&6));
    }
}
