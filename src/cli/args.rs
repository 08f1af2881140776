//! Command-line argument parsing

use crate::config::{
    ConnectionConfig, DEFAULT_ITEM_LOCATION, OutputFormat, RepositoryFilters, Side, SyncConfig,
};
use crate::error::{Result, SyncError};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-sync")]
#[command(about = "Copy the artifacts missing on a destination Nexus registry from a source one")]
#[command(version, author)]
pub struct Args {
    /// Repository formats to sync
    #[arg(
        long = "repo-format",
        short = 'f',
        value_delimiter = ',',
        help = "Only sync repositories of these formats (comma separated)"
    )]
    pub repo_format: Vec<String>,

    /// Repository names to sync
    #[arg(
        long = "repo-name",
        short = 'n',
        value_delimiter = ',',
        help = "Only sync repositories with these names (comma separated)"
    )]
    pub repo_name: Vec<String>,

    /// Component tags to sync
    #[arg(
        long = "tags",
        short = 't',
        value_delimiter = ',',
        help = "Only sync components carrying one of these tags (comma separated)"
    )]
    pub tags: Vec<String>,

    /// Local download directory
    #[arg(
        long = "item-location",
        short = 'l',
        default_value = DEFAULT_ITEM_LOCATION,
        help = "Directory downloaded artifacts are cached in"
    )]
    pub item_location: PathBuf,

    /// Workers per role
    #[arg(
        long = "parallelization",
        short = 'p',
        default_value = "4",
        help = "Number of download workers and of upload workers"
    )]
    pub parallelization: usize,

    /// Verbose output
    #[arg(
        long = "verbose",
        short = 'v',
        help = "Enable verbose output"
    )]
    pub verbose: bool,

    /// Timeout in seconds for registry requests
    #[arg(
        long = "timeout",
        default_value = "300",
        help = "Timeout for registry requests in seconds"
    )]
    pub timeout: u64,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    /// Plan only
    #[arg(
        long = "dry-run",
        help = "Compute and print what would be synced without transferring anything"
    )]
    pub dry_run: bool,

    /// Output format for the final report
    #[arg(
        long = "output",
        short = 'o',
        default_value = "text",
        help = "Output format: text, json"
    )]
    pub output: String,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<()> {
        if self.parallelization == 0 {
            return Err(SyncError::Validation(
                "Parallelization must be greater than 0".to_string(),
            ));
        }

        if self.timeout == 0 {
            return Err(SyncError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        self.output.parse::<OutputFormat>()?;
        Ok(())
    }

    pub fn filters(&self) -> RepositoryFilters {
        RepositoryFilters::default()
            .with_names(self.repo_name.clone())
            .with_formats(self.repo_format.clone())
    }

    pub fn sync_config(&self) -> Result<SyncConfig> {
        let config = SyncConfig {
            item_location: self.item_location.clone(),
            parallelization: self.parallelization,
            filters: self.filters(),
            tags: self.tags.clone(),
            verbose: self.verbose,
            dry_run: self.dry_run,
            output: self.output.parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Connection settings for one side, endpoints and credentials read from
    /// the environment
    pub fn connection(&self, side: Side) -> Result<ConnectionConfig> {
        let config = ConnectionConfig::from_env(side)?
            .with_skip_tls(self.skip_tls)
            .with_timeout(self.timeout);
        config.validate()?;
        Ok(config)
    }

    /// Print usage examples
    pub fn print_examples() {
        println!("Examples:");
        println!("  # Sync every hosted, proxy and group repository");
        println!("  registry-sync");
        println!();
        println!("  # Only maven2 and npm repositories, eight workers per role");
        println!("  registry-sync -f maven2,npm -p 8");
        println!();
        println!("  # One repository, components tagged 'release', plan only");
        println!("  registry-sync -n maven-releases -t release --dry-run");
        println!();
        println!("  # Endpoints and credentials come from the environment or a .env file");
        println!("  export SOURCE_NEXUS_URL=https://nexus-a.example.com");
        println!("  export DESTINATION_NEXUS_URL=https://nexus-b.example.com");
        println!("  export SOURCE_USERNAME=admin SOURCE_PASSWORD=secret");
        println!("  export DOCKER_PULL_URL=nexus-a.example.com:8082 DOCKER_PUSH_URL=nexus-b.example.com:8082");
    }
}
