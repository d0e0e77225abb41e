//! Listing Harvester CLI Tool
//!
//! Command-line interface that harvests listing images into a directory and
//! optionally tags them with their vehicle provenance.

use super::config::CliConfigBuilder;
use crate::{
    harvest::{HarvestCoordinator, HarvestReport},
    metadata::MetadataEmbedder,
    models::ImageMetadata,
    services::{ConsoleProgressReporter, ProgressReporter},
    tracing_config::{init_cli_tracing, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Vehicle listing image harvester
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "listing-harvester")]
pub struct Cli {
    /// Directory images are written to
    #[arg(short, long, value_name = "DIR", default_value = crate::config::DEFAULT_OUTPUT_DIR)]
    pub dir: PathBuf,

    /// Number of images to save
    #[arg(short = 'n', long, value_name = "N", default_value_t = crate::config::DEFAULT_MAX_IMAGES)]
    pub count: usize,

    /// Listings endpoint [env: LISTING_HARVESTER_ENDPOINT]
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Country code sent with every page request
    #[arg(long, value_name = "CC", default_value = crate::config::DEFAULT_COUNTRY)]
    pub country: String,

    /// Save images as downloaded, without embedding vehicle metadata
    #[arg(long)]
    pub no_metadata: bool,

    /// Per-request timeout in seconds [default: none]
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the vehicle metadata embedded in FILE and exit
    #[arg(long, value_name = "FILE")]
    pub inspect: Option<PathBuf>,

    /// Show a progress bar instead of one log line per image
    #[arg(long)]
    pub progress: bool,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn main() -> Result<()> {
    let cli = parse_args();

    init_cli_tracing(cli.verbose, TracingFormat::Console)
        .context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;

    if let Some(path) = &cli.inspect {
        return inspect_file(path);
    }

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    info!("Starting listing harvest");
    info!("Endpoint: {} (country {})", config.endpoint, config.country);
    info!(
        "Saving up to {} image(s) to {}",
        config.max_images,
        config.output_dir.display()
    );
    debug!(
        embed_metadata = config.embed_metadata,
        timeout = ?config.request_timeout,
        user_agent = %config.user_agent,
        "Harvest configuration"
    );

    let reporter: Box<dyn ProgressReporter> = if cli.progress {
        Box::new(BarProgressReporter::new(config.max_images))
    } else {
        Box::new(ConsoleProgressReporter::new(cli.verbose > 0))
    };

    let start_time = Instant::now();
    let report = HarvestCoordinator::from_config(&config)
        .context("Failed to create harvest coordinator")?
        .with_reporter(reporter)
        .harvest(config.max_images)
        .await
        .context("Harvest failed")?;

    info!(
        "Saved {} of {} image(s) from {} candidate(s) in {:.2}s",
        report.saved_count(),
        report.requested,
        report.candidates_seen,
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Parse arguments, printing the usage line along with any parse error
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            eprintln!("{}", e);
            eprintln!("{}", Cli::command().render_usage());
            std::process::exit(2);
        },
        // --help and --version
        Err(e) => e.exit(),
    }
}

/// Print the provenance embedded in a previously harvested image
fn inspect_file(path: &Path) -> Result<()> {
    let comment = MetadataEmbedder::read_comment(path)
        .with_context(|| format!("Failed to read metadata from {}", path.display()))?;

    match comment {
        Some(text) => match ImageMetadata::from_json(&text) {
            Ok(metadata) => {
                println!("📷 {}", path.display());
                println!("  • Make:  {}", metadata.vehicle.make);
                println!("  • Model: {}", metadata.vehicle.model);
                println!("  • Raw:   {}", text);
            },
            Err(_) => {
                println!("📷 {}", path.display());
                println!("  • UserComment (not harvest metadata): {}", text);
            },
        },
        None => println!("No embedded metadata found in {}", path.display()),
    }

    Ok(())
}

/// Progress reporter driving an `indicatif` bar sized to the budget
struct BarProgressReporter {
    bar: ProgressBar,
}

impl BarProgressReporter {
    fn new(budget: usize) -> Self {
        let bar = ProgressBar::new(budget as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        Self { bar }
    }
}

impl ProgressReporter for BarProgressReporter {
    fn report_page(&self, page_index: u32, _listings: usize, candidates_seen: usize) {
        self.bar.set_message(format!(
            "page {} ({} candidates)",
            page_index, candidates_seen
        ));
    }

    fn report_pagination_stopped(&self, page_index: u32, reason: &str) {
        self.bar
            .println(format!("⚠️  Stopped paging at page {}: {}", page_index, reason));
    }

    fn report_attempt(&self, url: &str) {
        let name = url.rsplit('/').next().unwrap_or(url);
        self.bar.set_message(name.to_string());
    }

    fn report_saved(&self, _url: &str, _path: &Path) {
        self.bar.inc(1);
    }

    fn report_failure(&self, url: &str, error: &str) {
        self.bar.println(format!("❌ {}: {}", url, error));
    }

    fn report_embed_skipped(&self, path: &Path, reason: &str) {
        self.bar
            .println(format!("⚠️  {} saved without metadata: {}", path.display(), reason));
    }

    fn report_completion(&self, report: &HarvestReport) {
        self.bar.abandon_with_message(format!(
            "done: {} saved, {} failed",
            report.saved_count(),
            report.failed_count()
        ));
    }
}
