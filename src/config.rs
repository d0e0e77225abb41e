//! Configuration types for harvest runs

use crate::error::{HarvestError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Listings endpoint queried when none is configured
pub const DEFAULT_ENDPOINT: &str =
    "https://www.autoscout24.nl/_next/data/as24-search-funnel_main-4422/lst.json";

/// Country code sent as the `cy` query parameter
pub const DEFAULT_COUNTRY: &str = "NL";

/// Directory images are written to
pub const DEFAULT_OUTPUT_DIR: &str = "./images";

/// Number of images saved per run
pub const DEFAULT_MAX_IMAGES: usize = 20;

/// Environment variable consulted by the CLI for the endpoint
pub const ENDPOINT_ENV_VAR: &str = "LISTING_HARVESTER_ENDPOINT";

/// Configuration for a harvest run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Paginated listings endpoint (without query string)
    pub endpoint: String,
    /// Country code sent with every page request
    pub country: String,
    /// Directory downloaded images are written to
    pub output_dir: PathBuf,
    /// Maximum number of images to save
    pub max_images: usize,
    /// Embed vehicle provenance into each saved image
    pub embed_metadata: bool,
    /// Per-request timeout (None = transport default)
    pub request_timeout: Option<Duration>,
    /// Value of the User-Agent header
    pub user_agent: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_images: DEFAULT_MAX_IMAGES,
            embed_metadata: true,
            request_timeout: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HarvestConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder::new()
    }

    /// Validate all fields
    ///
    /// # Errors
    /// - `HarvestError::InvalidConfig` describing the first offending field
    pub fn validate(&self) -> Result<()> {
        let endpoint = Url::parse(&self.endpoint).map_err(|e| {
            HarvestError::invalid_config(format!("Invalid endpoint '{}': {}", self.endpoint, e))
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(HarvestError::invalid_config(format!(
                "Unsupported endpoint scheme '{}': only http and https are supported",
                endpoint.scheme()
            )));
        }

        if self.country.is_empty() || !self.country.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(HarvestError::invalid_config(format!(
                "Invalid country code '{}': expected ASCII letters or digits",
                self.country
            )));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(HarvestError::invalid_config(
                "Output directory cannot be empty",
            ));
        }
        if self.output_dir.is_file() {
            return Err(HarvestError::invalid_config(format!(
                "Output path exists and is a file, not a directory: {}",
                self.output_dir.display()
            )));
        }

        if self.request_timeout == Some(Duration::ZERO) {
            return Err(HarvestError::invalid_config(
                "Request timeout must be greater than zero",
            ));
        }

        if self.user_agent.trim().is_empty() {
            return Err(HarvestError::invalid_config("User agent cannot be empty"));
        }

        Ok(())
    }

    /// Build the shared HTTP client for this configuration
    ///
    /// # Errors
    /// - `HarvestError::Transport` when the client cannot be constructed
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.clone());
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| HarvestError::network_error("Failed to create HTTP client", e))
    }
}

/// Builder for `HarvestConfig`
#[derive(Debug, Default)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn country<S: Into<String>>(mut self, country: S) -> Self {
        self.config.country = country.into();
        self
    }

    #[must_use]
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn max_images(mut self, max_images: usize) -> Self {
        self.config.max_images = max_images;
        self
    }

    #[must_use]
    pub fn embed_metadata(mut self, embed: bool) -> Self {
        self.config.embed_metadata = embed;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - `HarvestError::InvalidConfig` when any field fails validation
    pub fn build(self) -> Result<HarvestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
