#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Listing Harvester
//!
//! Harvests vehicle listing images from a paginated JSON endpoint, stores a
//! bounded number of canonical (non-resized) images on disk and tags each JPEG
//! with the vehicle it was listed under.
//!
//! ## Features
//!
//! - **URL canonicalization**: CDN resize markers such as `/250x188.webp` are stripped
//! - **Global budget**: pagination stops once enough candidates cover the budget,
//!   downloads stop once the budget of saved files is met
//! - **Safe metadata embedding**: the EXIF `UserComment` carries a JSON payload,
//!   every other JPEG segment and the scan data stay byte-identical
//! - **Atomic writes**: images land under their final name only when complete
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use listing_harvester::{HarvestConfig, HarvestCoordinator};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = HarvestConfig::builder()
//!     .country("NL")
//!     .output_dir("./images")
//!     .max_images(10)
//!     .build()?;
//!
//! let report = HarvestCoordinator::from_config(&config)?
//!     .harvest(config.max_images)
//!     .await?;
//! println!("saved {} of {}", report.saved_count(), report.requested);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): Command-line interface and progress reporting
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! listing-harvester = { version = "0.1", default-features = false }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod harvest;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod services;
pub mod source;
#[cfg(test)]
pub(crate) mod test_utils;
#[cfg(feature = "cli")]
pub mod tracing_config;

// Public API exports
pub use config::{HarvestConfig, HarvestConfigBuilder};
pub use download::{HttpImageFetcher, ImageBody, ImageFetcher};
pub use error::{HarvestError, Result};
pub use harvest::{
    next_page_index, AssetOutcome, EmbedStatus, HarvestCoordinator, HarvestReport, HarvestState,
    PaginationStop,
};
pub use metadata::MetadataEmbedder;
pub use models::{parse_listings, ImageAsset, ImageMetadata, Listing, VehicleRecord};
pub use normalize::{normalize_url, UrlNormalizer};
pub use services::{ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter};
pub use source::{HttpListingSource, ListingSource};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Run a harvest over HTTP with console progress logging
///
/// Saves at most `config.max_images` images into `config.output_dir`.
///
/// # Examples
///
/// ```rust,no_run
/// use listing_harvester::{harvest, HarvestConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = HarvestConfig::builder().max_images(5).build()?;
/// let report = harvest(&config).await?;
/// assert!(report.saved_count() <= 5);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - `HarvestError::InvalidConfig` for an invalid configuration
/// - `HarvestError::Io` when the output directory cannot be prepared
pub async fn harvest(config: &HarvestConfig) -> Result<HarvestReport> {
    HarvestCoordinator::from_config(config)?
        .with_reporter(Box::new(ConsoleProgressReporter::new(false)))
        .harvest(config.max_images)
        .await
}
