//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{HarvestConfig, HarvestConfigBuilder, ENDPOINT_ENV_VAR};
use anyhow::{Context, Result};
use std::time::Duration;

/// Convert CLI arguments to a validated [`HarvestConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build a `HarvestConfig` from CLI arguments and the environment
    pub(crate) fn from_cli(cli: &Cli) -> Result<HarvestConfig> {
        let env_endpoint = std::env::var(ENDPOINT_ENV_VAR).ok();
        Self::from_cli_with_env(cli, env_endpoint.as_deref())
    }

    /// Build a `HarvestConfig` with an explicit value for the endpoint override
    pub(crate) fn from_cli_with_env(cli: &Cli, env_endpoint: Option<&str>) -> Result<HarvestConfig> {
        let mut builder = HarvestConfigBuilder::new()
            .country(cli.country.clone())
            .output_dir(cli.dir.clone())
            .max_images(cli.count)
            .embed_metadata(!cli.no_metadata)
            .request_timeout(cli.timeout.map(Duration::from_secs));

        let endpoint = cli
            .endpoint
            .as_deref()
            .or_else(|| env_endpoint.filter(|value| !value.trim().is_empty()));
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint(endpoint);
        }

        builder.build().context("Invalid configuration")
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.timeout == Some(0) {
            anyhow::bail!("--timeout must be at least 1 second");
        }

        if cli.dir.is_file() {
            anyhow::bail!(
                "Output path exists and is a file, not a directory: {}",
                cli.dir.display()
            );
        }

        if cli.inspect.is_some() && cli.progress {
            anyhow::bail!("--inspect cannot be combined with --progress");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_ENDPOINT, DEFAULT_MAX_IMAGES};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_cli() -> Cli {
        Cli {
            dir: PathBuf::from("./images"),
            count: DEFAULT_MAX_IMAGES,
            endpoint: None,
            country: "NL".to_string(),
            no_metadata: false,
            timeout: None,
            inspect: None,
            progress: false,
            verbose: 0,
        }
    }

    #[test]
    fn test_cli_config_conversion() {
        let mut cli = create_test_cli();
        cli.count = 7;
        cli.no_metadata = true;
        cli.timeout = Some(15);

        let config = CliConfigBuilder::from_cli_with_env(&cli, None).unwrap();

        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.max_images, 7);
        assert!(!config.embed_metadata);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.output_dir, PathBuf::from("./images"));
    }

    #[test]
    fn test_endpoint_precedence() {
        let mut cli = create_test_cli();

        let config =
            CliConfigBuilder::from_cli_with_env(&cli, Some("http://env.local/lst.json")).unwrap();
        assert_eq!(config.endpoint, "http://env.local/lst.json");

        // Blank environment values are ignored
        let config = CliConfigBuilder::from_cli_with_env(&cli, Some("  ")).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);

        cli.endpoint = Some("http://flag.local/lst.json".to_string());
        let config =
            CliConfigBuilder::from_cli_with_env(&cli, Some("http://env.local/lst.json")).unwrap();
        assert_eq!(config.endpoint, "http://flag.local/lst.json");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut cli = create_test_cli();
        cli.endpoint = Some("not a url".to_string());
        assert!(CliConfigBuilder::from_cli_with_env(&cli, None).is_err());
    }

    #[test]
    fn test_cli_validation() {
        let mut cli = create_test_cli();
        assert!(CliConfigBuilder::validate_cli(&cli).is_ok());

        cli.timeout = Some(0);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        cli.timeout = None;
        cli.inspect = Some(PathBuf::from("a.jpg"));
        cli.progress = true;
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());
    }

    #[test]
    fn test_output_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("images");
        std::fs::write(&file, b"x").unwrap();

        let mut cli = create_test_cli();
        cli.dir = file;
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());
    }
}
