//! Registry client abstraction and Nexus REST wire types
//!
//! The sync engine only talks to registries through [`RegistryClient`]. The
//! production implementation is [`nexus::NexusClient`]; tests substitute an
//! in-memory double.

pub mod docker;
pub mod nexus;

pub use docker::DockerTransport;
pub use nexus::{NexusClient, NexusClientBuilder};

use crate::artifact::ArtifactKind;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Registry operations the sync engine depends on
///
/// Listing and search calls must return every page; callers never see
/// continuation tokens.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// List every repository on the registry
    async fn list_repositories(&self) -> Result<Vec<RepositoryData>>;

    /// List every component (with its assets) of one repository
    async fn list_components(&self, repository: &str) -> Result<Vec<ComponentData>>;

    /// Search assets by name, format, repository and content hash
    async fn search_assets(&self, query: &AssetQuery) -> Result<Vec<AssetData>>;

    /// Size in bytes of the asset behind `download_url`
    async fn fetch_size(&self, download_url: &str) -> Result<u64>;

    /// Whether the configured credentials may write to the registry
    async fn is_writable(&self) -> Result<bool>;

    /// Store the asset behind `download_url` at `destination`
    async fn download_asset(&self, download_url: &str, destination: &Path) -> Result<()>;

    /// Upload `file` as a component of `repository`
    async fn upload_component(&self, repository: &str, kind: &ArtifactKind, file: &Path) -> Result<()>;

    async fn download_docker_image(&self, image: &str, tag: &str) -> Result<()>;

    async fn upload_docker_image(&self, image: &str, tag: &str) -> Result<()>;
}

/// Repository entry from `GET /service/rest/v1/repositories`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryData {
    pub name: String,
    pub format: String,
    #[serde(rename = "type")]
    pub repository_type: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Component entry from `GET /service/rest/v1/components`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub assets: Vec<AssetData>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Asset entry, as nested in components or returned by asset search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetData {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub checksum: Option<Checksum>,
}

const SHA1_HEX_LEN: usize = 40;

impl AssetData {
    /// SHA-256 when the registry reports one, otherwise SHA-1
    pub fn content_hash(&self) -> Option<&str> {
        let checksum = self.checksum.as_ref()?;
        checksum.sha256.as_deref().or(checksum.sha1.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
}

/// One page of a paginated listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub continuation_token: Option<String>,
}

/// Asset search parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetQuery {
    pub name: String,
    pub format: String,
    pub repository: String,
    pub hash: Option<String>,
}

impl AssetQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("name", self.name.clone()),
            ("format", self.format.clone()),
            ("repository", self.repository.clone()),
        ];
        if let Some(hash) = &self.hash {
            let key = if hash.len() == SHA1_HEX_LEN { "sha1" } else { "sha256" };
            params.push((key, hash.clone()));
        }
        params
    }
}
