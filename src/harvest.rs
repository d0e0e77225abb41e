//! Harvest coordination
//!
//! [`HarvestCoordinator`] pages through the listing source until it has seen
//! enough candidate images to cover the budget, then downloads candidates in
//! listing order until the budget of saved files is met.
//!
//! Two counters are kept apart: `candidates_seen` counts every constructed
//! [`ImageAsset`] and only gates pagination, while `downloaded` counts files
//! actually saved and gates the download loop.

use crate::{
    config::HarvestConfig,
    download::{HttpImageFetcher, ImageFetcher},
    error::{HarvestError, Result},
    metadata::MetadataEmbedder,
    models::{ImageAsset, Listing},
    services::{NoOpProgressReporter, ProgressReporter},
    source::{HttpListingSource, ListingSource},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Coordinator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestState {
    /// Fetching pages and collecting candidates
    Paginating,
    /// Downloading collected candidates
    Draining,
    /// Run finished
    Done,
}

/// Why pagination ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationStop {
    /// Enough candidates were collected to cover the budget
    BudgetReached,
    /// The source returned an empty page
    Exhausted,
    /// A page could not be retrieved or decoded
    SourceFailed(String),
    /// The next page index does not fit in a `u32`
    PageIndexOverflow,
}

/// Result of tagging a saved image with provenance metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedStatus {
    Embedded,
    /// The file was kept as downloaded
    Skipped(String),
    /// Embedding is turned off for this run
    Disabled,
}

/// Per-asset result of the download loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    Saved {
        url: String,
        path: PathBuf,
        embed: EmbedStatus,
    },
    Failed {
        url: String,
        reason: String,
    },
}

/// Summary of a harvest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Budget the run was started with
    pub requested: usize,
    /// Image assets constructed while paging
    pub candidates_seen: usize,
    /// Images saved to disk
    pub downloaded: usize,
    /// Page indices requested, in order
    pub pages_requested: Vec<u32>,
    pub stop_reason: PaginationStop,
    /// One entry per attempted download, in attempt order
    pub outcomes: Vec<AssetOutcome>,
}

impl HarvestReport {
    /// Number of images actually saved
    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.downloaded
    }

    #[must_use]
    pub fn attempted_count(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, AssetOutcome::Failed { .. }))
            .count()
    }

    /// Saved images whose provenance could not be embedded
    #[must_use]
    pub fn embed_skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| {
                matches!(
                    outcome,
                    AssetOutcome::Saved {
                        embed: EmbedStatus::Skipped(_),
                        ..
                    }
                )
            })
            .count()
    }

    #[must_use]
    pub fn saved_paths(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                AssetOutcome::Saved { path, .. } => Some(path.as_path()),
                AssetOutcome::Failed { .. } => None,
            })
            .collect()
    }
}

/// Next page index: `2 × current + 1`, or `None` on overflow
#[must_use]
pub fn next_page_index(current: u32) -> Option<u32> {
    current.checked_mul(2)?.checked_add(1)
}

struct Pagination {
    listings: Vec<Listing>,
    candidates_seen: usize,
    pages_requested: Vec<u32>,
    stop_reason: PaginationStop,
}

/// Drives pagination and downloads under a global image budget
pub struct HarvestCoordinator {
    source: Box<dyn ListingSource>,
    fetcher: Box<dyn ImageFetcher>,
    reporter: Box<dyn ProgressReporter>,
    output_dir: PathBuf,
    embed_metadata: bool,
    state: HarvestState,
}

impl HarvestCoordinator {
    /// Create a coordinator writing into `output_dir` with metadata embedding on
    #[must_use]
    pub fn new<P: Into<PathBuf>>(
        source: Box<dyn ListingSource>,
        fetcher: Box<dyn ImageFetcher>,
        output_dir: P,
    ) -> Self {
        Self {
            source,
            fetcher,
            reporter: Box::new(NoOpProgressReporter),
            output_dir: output_dir.into(),
            embed_metadata: true,
            state: HarvestState::Paginating,
        }
    }

    /// Create a coordinator talking to the configured HTTP endpoint
    ///
    /// # Errors
    /// - `HarvestError::InvalidConfig` when the configuration is invalid
    /// - `HarvestError::Transport` when the HTTP client cannot be built
    pub fn from_config(config: &HarvestConfig) -> Result<Self> {
        config.validate()?;
        let client = config.http_client()?;
        let source = HttpListingSource::from_config(config, client.clone());
        let fetcher = HttpImageFetcher::new(client);
        Ok(
            Self::new(Box::new(source), Box::new(fetcher), config.output_dir.clone())
                .with_metadata(config.embed_metadata),
        )
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, embed: bool) -> Self {
        self.embed_metadata = embed;
        self
    }

    #[must_use]
    pub fn state(&self) -> HarvestState {
        self.state
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run a harvest saving at most `budget` images
    ///
    /// Page and image failures are absorbed into the report.
    ///
    /// # Errors
    /// - `HarvestError::Io` when the output directory cannot be prepared
    #[instrument(skip(self), fields(output_dir = %self.output_dir.display()))]
    pub async fn harvest(&mut self, budget: usize) -> Result<HarvestReport> {
        self.state = HarvestState::Paginating;
        let pagination = self.paginate(budget).await;
        info!(
            pages = pagination.pages_requested.len(),
            listings = pagination.listings.len(),
            candidates = pagination.candidates_seen,
            stop = ?pagination.stop_reason,
            "Pagination finished"
        );

        self.state = HarvestState::Draining;
        ensure_output_dir(&self.output_dir)?;
        let (downloaded, outcomes) = self.drain(&pagination.listings, budget).await;

        self.state = HarvestState::Done;
        let report = HarvestReport {
            requested: budget,
            candidates_seen: pagination.candidates_seen,
            downloaded,
            pages_requested: pagination.pages_requested,
            stop_reason: pagination.stop_reason,
            outcomes,
        };
        self.reporter.report_completion(&report);
        Ok(report)
    }

    async fn paginate(&self, budget: usize) -> Pagination {
        let mut listings = Vec::new();
        let mut candidates_seen = 0usize;
        let mut pages_requested = Vec::new();
        let mut next_index = Some(1u32);

        let stop_reason = loop {
            if candidates_seen >= budget {
                break PaginationStop::BudgetReached;
            }
            let Some(page_index) = next_index else {
                break PaginationStop::PageIndexOverflow;
            };

            pages_requested.push(page_index);
            match self.source.fetch_page(page_index).await {
                Err(e) => {
                    warn!(page = page_index, error = %e, "Listings page not retrievable");
                    self.reporter
                        .report_pagination_stopped(page_index, &e.to_string());
                    break PaginationStop::SourceFailed(e.to_string());
                },
                Ok(batch) if batch.is_empty() => {
                    debug!(page = page_index, "Empty listings page, source exhausted");
                    break PaginationStop::Exhausted;
                },
                Ok(batch) => {
                    candidates_seen += batch.iter().map(|l| l.images.len()).sum::<usize>();
                    self.reporter
                        .report_page(page_index, batch.len(), candidates_seen);
                    listings.extend(batch);
                },
            }

            next_index = next_page_index(page_index);
        };

        Pagination {
            listings,
            candidates_seen,
            pages_requested,
            stop_reason,
        }
    }

    async fn drain(&self, listings: &[Listing], budget: usize) -> (usize, Vec<AssetOutcome>) {
        let mut downloaded = 0usize;
        let mut outcomes = Vec::new();

        'listings: for listing in listings {
            for asset in &listing.images {
                if downloaded >= budget {
                    break 'listings;
                }

                let url = asset.canonical_url().to_string();
                self.reporter.report_attempt(&url);
                match asset.download(self.fetcher.as_ref(), &self.output_dir).await {
                    Ok(path) => {
                        downloaded += 1;
                        let embed = self.embed(asset, &path);
                        self.reporter.report_saved(&url, &path);
                        outcomes.push(AssetOutcome::Saved { url, path, embed });
                    },
                    Err(e) => {
                        self.reporter.report_failure(&url, &e.to_string());
                        outcomes.push(AssetOutcome::Failed {
                            url,
                            reason: e.to_string(),
                        });
                    },
                }
            }
        }

        (downloaded, outcomes)
    }

    fn embed(&self, asset: &ImageAsset, path: &Path) -> EmbedStatus {
        if !self.embed_metadata {
            return EmbedStatus::Disabled;
        }

        match MetadataEmbedder::embed(path, &asset.metadata()) {
            Ok(()) => EmbedStatus::Embedded,
            Err(e) => {
                self.reporter.report_embed_skipped(path, &e.to_string());
                EmbedStatus::Skipped(e.to_string())
            },
        }
    }
}

/// Create the output directory if it does not exist yet
///
/// # Errors
/// - `HarvestError::InvalidConfig` when the path exists but is not a directory
/// - `HarvestError::Io` when the directory cannot be created
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(HarvestError::invalid_config(format!(
            "Output path exists and is a file, not a directory: {}",
            dir.display()
        )));
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| HarvestError::file_io_error("create output directory", dir, &e))
}
