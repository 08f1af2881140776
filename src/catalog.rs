//! Registry catalog
//!
//! Wraps one side's [`RegistryClient`] with the run's filters: lists the
//! repositories worth syncing, turns component listings into [`Artifact`]s,
//! performs transfers with boolean outcomes, and resolves the content hash an
//! artifact ended up with on the registry.

use crate::artifact::Artifact;
use crate::artifact::classify::{build_artifact, is_syncable};
use crate::cache::LocalCache;
use crate::config::{RepositoryFilters, Side};
use crate::digest::DigestUtils;
use crate::error::{Result, SyncError};
use crate::registry::{AssetData, AssetQuery, RegistryClient};
use crate::repository::Repository;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_SEARCH_ATTEMPTS: u32 = 3;
pub const DEFAULT_SEARCH_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Outcome of looking up an artifact's content hash on a registry
///
/// An unresolved lookup is a value, not an error, so it can be recorded as a
/// corrupted transfer like any real mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum RemoteHash {
    Found(String),
    NoSearchResults,
    MultipleMatchesFound,
}

impl RemoteHash {
    pub fn as_str(&self) -> &str {
        match self {
            RemoteHash::Found(hash) => hash,
            RemoteHash::NoSearchResults => "no_search_results",
            RemoteHash::MultipleMatchesFound => "multiple_matches_found",
        }
    }

    /// True only for a found hash equal to `expected`
    pub fn matches(&self, expected: Option<&str>) -> bool {
        match (self, expected) {
            (RemoteHash::Found(found), Some(expected)) => DigestUtils::same_digest(found, expected),
            _ => false,
        }
    }
}

impl fmt::Display for RemoteHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RemoteHash> for String {
    fn from(hash: RemoteHash) -> Self {
        hash.as_str().to_string()
    }
}

pub struct Catalog {
    side: Side,
    client: Arc<dyn RegistryClient>,
    cache: LocalCache,
    filters: RepositoryFilters,
    tags: Vec<String>,
    search_attempts: u32,
    search_retry_delay: Duration,
}

impl Catalog {
    pub fn new(side: Side, client: Arc<dyn RegistryClient>, cache: LocalCache) -> Self {
        Self {
            side,
            client,
            cache,
            filters: RepositoryFilters::default(),
            tags: Vec::new(),
            search_attempts: DEFAULT_SEARCH_ATTEMPTS,
            search_retry_delay: DEFAULT_SEARCH_RETRY_DELAY,
        }
    }

    pub fn with_filters(mut self, filters: RepositoryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Number of searches and the pause between them while results are empty
    pub fn with_search_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.search_attempts = attempts.max(1);
        self.search_retry_delay = delay;
        self
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn client(&self) -> &dyn RegistryClient {
        self.client.as_ref()
    }

    /// Fails unless the configured credentials may write to the registry
    pub async fn verify_connection(&self) -> Result<()> {
        if self.client.is_writable().await? {
            Ok(())
        } else {
            Err(SyncError::Authentication(format!(
                "Failed to authenticate against the {} registry, check its credentials",
                self.side.label()
            )))
        }
    }

    /// Repositories passing every configured filter
    pub async fn fetch_repositories(&self) -> Result<Vec<Repository>> {
        let repositories = self
            .client
            .list_repositories()
            .await?
            .into_iter()
            .map(Repository::from)
            .filter(|repository| self.filters.matches(repository))
            .collect();
        Ok(repositories)
    }

    /// Copies of `repositories` holding this registry's syncable artifacts
    pub async fn fetch_artifact_metadata(&self, repositories: &[Repository]) -> Result<Vec<Repository>> {
        let mut filled = Vec::with_capacity(repositories.len());

        for repository in repositories {
            let mut copy = repository.empty_copy();
            for component in self.client.list_components(&repository.name).await? {
                if !self.matches_tags(&component.tags) {
                    continue;
                }
                for asset in &component.assets {
                    if !is_syncable(asset)? {
                        continue;
                    }
                    let artifact = build_artifact(&component, asset)?;
                    let file_size = self.client.fetch_size(&artifact.download_url).await?;
                    copy.add(artifact.with_file_size(file_size));
                }
            }
            debug!(
                side = self.side.label(),
                repository = %copy.name,
                artifacts = copy.artifacts().len(),
                "fetched artifact metadata"
            );
            filled.push(copy);
        }

        Ok(filled)
    }

    /// Flatten repositories into one artifact list
    pub fn list_to_sync(&self, repositories: Vec<Repository>) -> Vec<Artifact> {
        repositories
            .into_iter()
            .flat_map(Repository::into_artifacts)
            .collect()
    }

    fn matches_tags(&self, component_tags: &[String]) -> bool {
        self.tags.is_empty() || component_tags.iter().any(|tag| self.tags.contains(tag))
    }

    pub async fn download(&self, artifact: &Artifact) -> bool {
        match artifact.download(self.client.as_ref(), &self.cache).await {
            Ok(()) => true,
            Err(e) => {
                warn!(artifact = %artifact, error = %e, "download attempt failed");
                false
            }
        }
    }

    pub async fn upload(&self, artifact: &Artifact) -> bool {
        match artifact.upload(self.client.as_ref(), &self.cache).await {
            Ok(()) => true,
            Err(e) => {
                warn!(artifact = %artifact, error = %e, "upload attempt failed");
                false
            }
        }
    }

    /// Look the artifact up by name, format, repository and hash, searching
    /// again while the index returns nothing. Several hits are narrowed down
    /// by exact path.
    pub async fn resolve_remote_hash(&self, artifact: &Artifact) -> RemoteHash {
        let query = AssetQuery {
            name: artifact.name.clone(),
            format: artifact.format().to_string(),
            repository: artifact.repository.clone(),
            hash: artifact.content_hash.clone(),
        };

        let mut results = Vec::new();
        for attempt in 1..=self.search_attempts {
            results = match self.client.search_assets(&query).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(artifact = %artifact, attempt, error = %e, "asset search failed");
                    Vec::new()
                }
            };
            if !results.is_empty() {
                break;
            }
            if attempt < self.search_attempts && !self.search_retry_delay.is_zero() {
                tokio::time::sleep(self.search_retry_delay).await;
            }
        }

        select_hash(results, artifact)
    }
}

fn select_hash(results: Vec<AssetData>, artifact: &Artifact) -> RemoteHash {
    let mut results = results;
    if results.is_empty() {
        return RemoteHash::NoSearchResults;
    }
    if results.len() > 1 {
        results.retain(|result| result.path.as_deref() == Some(artifact.path.as_str()));
        if results.len() != 1 {
            return RemoteHash::MultipleMatchesFound;
        }
    }
    // A hit without a checksum resolves to an empty hash, which never matches
    RemoteHash::Found(results[0].content_hash().unwrap_or_default().to_string())
}
