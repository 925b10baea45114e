//! HTTP Catalog Client
//!
//! `CatalogSource` adapter fetching the exchange market catalog over HTTP.

use async_trait::async_trait;
use reqwest::Client;

use crate::application::ports::{CatalogError, CatalogSource};
use crate::domain::market::MarketDescriptor;
use crate::infrastructure::config::CatalogSettings;
use crate::infrastructure::exchange::messages::CatalogResponse;

/// HTTP client for the exchange catalog endpoint.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: Client,
    url: String,
}

impl HttpCatalogSource {
    /// Create a client from catalog settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &CatalogSettings) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url: settings.url.clone(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_markets(&self) -> Result<Vec<MarketDescriptor>, CatalogError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CatalogError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::Request(e.to_string()))?;
        let catalog: CatalogResponse =
            serde_json::from_slice(&body).map_err(|e| CatalogError::Decode(e.to_string()))?;

        let markets = catalog.into_markets();
        tracing::debug!(markets = markets.len(), url = %self.url, "Fetched market catalog");
        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> HttpCatalogSource {
        HttpCatalogSource::new(&CatalogSettings::new(format!("{}/markets", server.uri()))).unwrap()
    }

    #[tokio::test]
    async fn fetches_and_zips_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/markets"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbol": ["BTCUSD", "ETHUSD"],
                "currency": ["USD", "USD"],
                "base-currency": ["BTC", "ETH"],
                "is-tradable": [true, true],
                "price-scale": [100, 100],
                "min-movement": ["0.0001", "0.001"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let markets = client_for(&server).fetch_markets().await.unwrap();

        assert_eq!(markets.len(), 2);
        assert_eq!(markets[1].base_currency, "ETH");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_markets().await.unwrap_err();

        assert!(matches!(
            err,
            CatalogError::Status { status: 503, ref body } if body == "maintenance"
        ));
    }

    #[tokio::test]
    async fn undecodable_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_markets().await.unwrap_err();

        assert!(matches!(err, CatalogError::Decode(_)));
    }
}
