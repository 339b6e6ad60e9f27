//! Manifold REST client
//!
//! Used for the bulk import: pages through every open binary market.

use std::time::Duration;

use mirror_core::{MirrorError, MirrorResult};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use crate::types::{LiteMarket, MANIFOLD_API_BASE, SEARCH_PAGE_SIZE};

/// Manifold API client
#[derive(Clone)]
pub struct ManifoldClient {
    client: Client,
    base_url: String,
    page_size: usize,
}

impl ManifoldClient {
    /// Create a client against the public API
    pub fn new() -> MirrorResult<Self> {
        Self::with_base_url(MANIFOLD_API_BASE)
    }

    /// Create a client against another deployment (or a test server)
    pub fn with_base_url(base_url: impl Into<String>) -> MirrorResult<Self> {
        let base_url = base_url.into();
        Url::parse(&base_url)
            .map_err(|e| MirrorError::config(format!("Invalid API URL {:?}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| MirrorError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size: SEARCH_PAGE_SIZE,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn page_url(&self, offset: usize) -> String {
        format!(
            "{}/v0/search-markets?term=&filter=open&contractType=BINARY&limit={}&offset={}",
            self.base_url, self.page_size, offset
        )
    }

    /// Fetch one page of open binary markets
    #[instrument(skip(self))]
    pub async fn fetch_page(&self, offset: usize) -> MirrorResult<Vec<LiteMarket>> {
        let url = self.page_url(offset);
        debug!("Fetching Manifold markets from: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MirrorError::network(format!("Failed to fetch markets: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MirrorError::api(format!(
                "Manifold API error ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MirrorError::parse(format!("Failed to parse markets response: {}", e)))
    }

    /// Fetch every open binary market, paging until an empty page
    #[instrument(skip(self))]
    pub async fn fetch_open_binary_markets(&self) -> MirrorResult<Vec<LiteMarket>> {
        let mut markets = Vec::new();
        let mut offset = 0;

        loop {
            let page = self.fetch_page(offset).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            markets.extend(page);
        }

        info!("Fetched {} open binary markets from Manifold", markets.len());
        Ok(markets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url() {
        let client = ManifoldClient::with_base_url("https://example.test/").unwrap();
        assert_eq!(client.base_url(), "https://example.test");
        assert_eq!(
            client.page_url(2000),
            "https://example.test/v0/search-markets?term=&filter=open&contractType=BINARY&limit=1000&offset=2000"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ManifoldClient::with_base_url("not a url"),
            Err(MirrorError::Config(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_fetch_first_page() {
        let client = ManifoldClient::new().unwrap();
        let page = client.fetch_page(0).await.unwrap();
        assert!(!page.is_empty());
    }
}
