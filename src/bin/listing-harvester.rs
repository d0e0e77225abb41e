//! Listing Harvester CLI Tool
//!
//! Command-line entry point for the listing-harvester library.

#[cfg(feature = "cli")]
use listing_harvester::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
