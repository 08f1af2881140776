//! Configuration for registry connections and sync runs
//!
//! Endpoints and credentials come from the environment (optionally seeded from a
//! `.env` file by the binary); run options come from the command line.

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{Result, SyncError};
use crate::repository::Repository;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_ITEM_LOCATION: &str = "downloads";
pub const DEFAULT_PARALLELIZATION: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Which registry a connection points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    fn env_prefix(&self) -> &'static str {
        match self {
            Side::Source => "SOURCE",
            Side::Destination => "DESTINATION",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Destination => "destination",
        }
    }
}

/// Endpoint and credentials for one registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub docker_pull_url: Option<String>,
    pub docker_push_url: Option<String>,
    pub skip_tls: bool,
    pub timeout: u64,
}

impl ConnectionConfig {
    /// Read `<SIDE>_NEXUS_URL`, `<SIDE>_USERNAME`, `<SIDE>_PASSWORD`,
    /// `DOCKER_PULL_URL` and `DOCKER_PUSH_URL` from the process environment
    pub fn from_env(side: Side) -> Result<Self> {
        Self::from_lookup(side, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(side: Side, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = side.env_prefix();
        let url_key = format!("{}_NEXUS_URL", prefix);
        let url = lookup(&url_key).filter(|v| !v.is_empty()).ok_or_else(|| {
            SyncError::Configuration(format!("{} not set", url_key))
        })?;

        let config = ConnectionConfig {
            url,
            username: lookup(&format!("{}_USERNAME", prefix)).filter(|v| !v.is_empty()),
            password: lookup(&format!("{}_PASSWORD", prefix)).filter(|v| !v.is_empty()),
            docker_pull_url: lookup("DOCKER_PULL_URL").filter(|v| !v.is_empty()),
            docker_push_url: lookup("DOCKER_PUSH_URL").filter(|v| !v.is_empty()),
            skip_tls: false,
            timeout: DEFAULT_TIMEOUT_SECS,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_auth(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        ValidationErrorHandler::validate_registry_url(&self.url)?;
        ValidationErrorHandler::validate_credentials(&self.username, &self.password)?;
        ValidationErrorHandler::validate_timeout(self.timeout)?;
        Ok(())
    }
}

/// Repository filters. A repository passes iff, for every non-empty filter,
/// its value equals one of that filter's values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFilters {
    pub names: Vec<String>,
    pub formats: Vec<String>,
    pub types: Vec<String>,
}

impl Default for RepositoryFilters {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            formats: Vec::new(),
            types: vec!["hosted".to_string(), "proxy".to_string(), "group".to_string()],
        }
    }
}

impl RepositoryFilters {
    /// No filtering at all, not even on repository type
    pub fn none() -> Self {
        Self {
            names: Vec::new(),
            formats: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn with_formats(mut self, formats: Vec<String>) -> Self {
        self.formats = formats;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.formats.is_empty() && self.types.is_empty()
    }

    pub fn matches(&self, repository: &Repository) -> bool {
        fn passes(values: &[String], candidate: &str) -> bool {
            values.is_empty() || values.iter().any(|v| v == candidate)
        }

        passes(&self.names, &repository.name)
            && passes(&self.formats, &repository.format)
            && passes(&self.types, &repository.repository_type)
    }
}

/// How the final report is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(SyncError::Validation(format!(
                "Output format must be one of: text, json (got '{}')",
                other
            ))),
        }
    }
}

/// Options for one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub item_location: PathBuf,
    pub parallelization: usize,
    pub filters: RepositoryFilters,
    pub tags: Vec<String>,
    pub verbose: bool,
    pub dry_run: bool,
    pub output: OutputFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            item_location: PathBuf::from(DEFAULT_ITEM_LOCATION),
            parallelization: DEFAULT_PARALLELIZATION,
            filters: RepositoryFilters::default(),
            tags: Vec::new(),
            verbose: false,
            dry_run: false,
            output: OutputFormat::Text,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parallelization == 0 {
            return Err(SyncError::Validation(
                "parallelization must be greater than 0".to_string(),
            ));
        }
        if self.item_location.as_os_str().is_empty() {
            return Err(SyncError::Validation(
                "item location cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
