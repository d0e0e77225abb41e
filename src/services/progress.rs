//! Progress reporting service
//!
//! This module separates progress reporting concerns from the harvest loop,
//! allowing different frontends to implement their own progress handling.

use crate::harvest::HarvestReport;
use std::path::Path;

/// Trait for reporting progress during a harvest run
pub trait ProgressReporter: Send + Sync {
    /// A listings page was fetched and decoded
    fn report_page(&self, page_index: u32, listings: usize, candidates_seen: usize);

    /// Pagination stopped before the budget was covered
    fn report_pagination_stopped(&self, page_index: u32, reason: &str);

    /// A download is about to be attempted
    fn report_attempt(&self, url: &str);

    /// An image was saved
    fn report_saved(&self, url: &str, path: &Path);

    /// An image could not be downloaded
    fn report_failure(&self, url: &str, error: &str);

    /// An image was saved but its provenance could not be embedded
    fn report_embed_skipped(&self, path: &Path, reason: &str);

    /// The run finished
    fn report_completion(&self, report: &HarvestReport);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_page(&self, _page_index: u32, _listings: usize, _candidates_seen: usize) {}

    fn report_pagination_stopped(&self, _page_index: u32, _reason: &str) {}

    fn report_attempt(&self, _url: &str) {}

    fn report_saved(&self, _url: &str, _path: &Path) {}

    fn report_failure(&self, _url: &str, _error: &str) {}

    fn report_embed_skipped(&self, _path: &Path, _reason: &str) {}

    fn report_completion(&self, _report: &HarvestReport) {}
}

/// Console progress reporter that logs one line per image
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// # Arguments
    /// * `verbose` - Whether to also log page-level detail
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_page(&self, page_index: u32, listings: usize, candidates_seen: usize) {
        if self.verbose {
            log::info!(
                "📄 Page {}: {} listing(s), {} candidate image(s) so far",
                page_index,
                listings,
                candidates_seen
            );
        }
    }

    fn report_pagination_stopped(&self, page_index: u32, reason: &str) {
        log::warn!("⚠️  Stopped paging at page {}: {}", page_index, reason);
    }

    fn report_attempt(&self, url: &str) {
        log::info!("Retrieving: {}", url);
    }

    fn report_saved(&self, _url: &str, path: &Path) {
        log::info!("Saved to: {}", path.display());
    }

    fn report_failure(&self, url: &str, error: &str) {
        log::warn!("❌ Retrieving {} failed: {}", url, error);
    }

    fn report_embed_skipped(&self, path: &Path, reason: &str) {
        log::warn!(
            "⚠️  Kept {} without provenance metadata: {}",
            path.display(),
            reason
        );
    }

    fn report_completion(&self, report: &HarvestReport) {
        log::info!(
            "✅ Saved {} of {} requested image(s)",
            report.downloaded,
            report.requested
        );

        if self.verbose {
            log::info!("  📊 Run summary:");
            log::info!("    • Pages requested: {:?}", report.pages_requested);
            log::info!("    • Candidates seen: {}", report.candidates_seen);
            log::info!("    • Download failures: {}", report.failed_count());
            log::info!("    • Saved without metadata: {}", report.embed_skipped_count());
        }
    }
}
