//! Paginated listing retrieval
//!
//! A [`ListingSource`] turns a page index into the listings on that page. An
//! empty page means pagination is exhausted; an error (transport or decode)
//! means the page is not retrievable. Callers stop paging in both cases.

use crate::config::HarvestConfig;
use crate::error::{HarvestError, Result};
use crate::models::{parse_listings, Listing};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::debug;

/// Source of listing pages
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch and decode one page of listings (`page_index` starts at 1)
    ///
    /// # Errors
    /// - `HarvestError::Transport` when the page cannot be retrieved
    /// - `HarvestError::Decode` when the body does not match the listings schema
    async fn fetch_page(&self, page_index: u32) -> Result<Vec<Listing>>;
}

/// Listing source backed by the remote JSON endpoint
#[derive(Debug, Clone)]
pub struct HttpListingSource {
    client: Client,
    endpoint: String,
    country: String,
}

impl HttpListingSource {
    #[must_use]
    pub fn new<E: Into<String>, C: Into<String>>(client: Client, endpoint: E, country: C) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            country: country.into(),
        }
    }

    /// Create a source for the endpoint and country of a configuration
    #[must_use]
    pub fn from_config(config: &HarvestConfig, client: Client) -> Self {
        Self::new(client, config.endpoint.clone(), config.country.clone())
    }

    /// URL of a page: `<endpoint>?cy=<country>&page=<n>`
    ///
    /// # Errors
    /// - `HarvestError::InvalidConfig` when the endpoint is not a valid URL
    pub fn page_url(&self, page_index: u32) -> Result<Url> {
        Url::parse_with_params(
            &self.endpoint,
            &[
                ("cy", self.country.as_str()),
                ("page", page_index.to_string().as_str()),
            ],
        )
        .map_err(|e| {
            HarvestError::invalid_config(format!("Invalid endpoint '{}': {}", self.endpoint, e))
        })
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch_page(&self, page_index: u32) -> Result<Vec<Listing>> {
        let url = self.page_url(page_index)?;
        debug!(page = page_index, url = %url, "Fetching listings page");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            HarvestError::network_error(format!("Failed to fetch page {}", page_index), e)
        })?;

        if !response.status().is_success() {
            return Err(HarvestError::http_status(response.status(), url.as_str()));
        }

        let body = response.bytes().await.map_err(|e| {
            HarvestError::network_error(format!("Failed to read page {} body", page_index), e)
        })?;

        let listings = parse_listings(&body)?;
        debug!(
            page = page_index,
            listings = listings.len(),
            "Decoded listings page"
        );
        Ok(listings)
    }
}
