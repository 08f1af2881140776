//! Transferable artifacts
//!
//! An [`Artifact`] is one asset of one registry component. Its transfer behavior
//! depends on its format, captured by the closed [`ArtifactKind`] variant set:
//! docker images travel through the docker transport, everything else is a file
//! that is downloaded into the local cache and re-uploaded as a component.

pub mod classify;

use crate::cache::LocalCache;
use crate::error::{Result, SyncError};
use crate::registry::RegistryClient;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Number of times an artifact is re-queued before it is permanently failed
pub const MAX_REQUEUE: u32 = 3;

/// Registry formats with a known transfer behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Docker,
    Maven2,
    Npm,
    Pypi,
    Raw,
    Rubygems,
    Yum,
}

impl ArtifactFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactFormat::Docker => "docker",
            ArtifactFormat::Maven2 => "maven2",
            ArtifactFormat::Npm => "npm",
            ArtifactFormat::Pypi => "pypi",
            ArtifactFormat::Raw => "raw",
            ArtifactFormat::Rubygems => "rubygems",
            ArtifactFormat::Yum => "yum",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactFormat {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "docker" => Ok(ArtifactFormat::Docker),
            "maven2" => Ok(ArtifactFormat::Maven2),
            "npm" => Ok(ArtifactFormat::Npm),
            "pypi" => Ok(ArtifactFormat::Pypi),
            "raw" => Ok(ArtifactFormat::Raw),
            "rubygems" => Ok(ArtifactFormat::Rubygems),
            "yum" => Ok(ArtifactFormat::Yum),
            other => Err(SyncError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// Per-format transfer data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ArtifactKind {
    Docker {
        image: String,
        tag: String,
    },
    #[serde(rename = "maven2")]
    Maven {
        group_id: String,
        artifact_id: String,
        version: String,
    },
    Npm,
    Pypi,
    Raw {
        directory: String,
    },
    Rubygems,
    Yum {
        directory: String,
    },
}

impl ArtifactKind {
    pub fn format(&self) -> ArtifactFormat {
        match self {
            ArtifactKind::Docker { .. } => ArtifactFormat::Docker,
            ArtifactKind::Maven { .. } => ArtifactFormat::Maven2,
            ArtifactKind::Npm => ArtifactFormat::Npm,
            ArtifactKind::Pypi => ArtifactFormat::Pypi,
            ArtifactKind::Raw { .. } => ArtifactFormat::Raw,
            ArtifactKind::Rubygems => ArtifactFormat::Rubygems,
            ArtifactKind::Yum { .. } => ArtifactFormat::Yum,
        }
    }
}

/// One transferable asset
///
/// Equality and hashing only consider `(path, name, content_hash, format,
/// repository)`: remote ids and download URLs legitimately differ between
/// two registries holding the same artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub id: String,
    pub repository: String,
    pub path: String,
    pub name: String,
    pub download_url: String,
    pub content_hash: Option<String>,
    pub file_size: u64,
    pub tags: Vec<String>,
    pub kind: ArtifactKind,
    times_requeued: u32,
}

impl Artifact {
    pub fn new(
        kind: ArtifactKind,
        repository: impl Into<String>,
        path: impl Into<String>,
        download_url: impl Into<String>,
        content_hash: Option<String>,
    ) -> Self {
        let download_url = download_url.into();
        let name = display_name(&download_url);

        Self {
            id: String::new(),
            repository: repository.into(),
            path: path.into(),
            name,
            download_url,
            content_hash,
            file_size: 0,
            tags: Vec::new(),
            kind,
            times_requeued: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_file_size(mut self, file_size: u64) -> Self {
        self.file_size = file_size;
        self
    }

    pub fn format(&self) -> ArtifactFormat {
        self.kind.format()
    }

    pub fn is_docker(&self) -> bool {
        self.format() == ArtifactFormat::Docker
    }

    pub fn times_requeued(&self) -> u32 {
        self.times_requeued
    }

    /// Spend one unit of the retry budget. Returns false once the budget is
    /// exhausted, leaving the counter at [`MAX_REQUEUE`].
    pub fn requeue(&mut self) -> bool {
        if self.times_requeued < MAX_REQUEUE {
            self.times_requeued += 1;
            true
        } else {
            false
        }
    }

    /// Content hash for display, empty when the registry reported none
    pub fn content_hash_str(&self) -> &str {
        self.content_hash.as_deref().unwrap_or("")
    }

    /// Fetch the artifact from `client` into the local cache
    pub async fn download(&self, client: &dyn RegistryClient, cache: &LocalCache) -> Result<()> {
        match &self.kind {
            ArtifactKind::Docker { image, tag } => client.download_docker_image(image, tag).await,
            _ => {
                let destination = cache.prepare(self).await?;
                client.download_asset(&self.download_url, &destination).await
            }
        }
    }

    /// Push the artifact to `client`, reading file formats from the local cache
    pub async fn upload(&self, client: &dyn RegistryClient, cache: &LocalCache) -> Result<()> {
        match &self.kind {
            ArtifactKind::Docker { image, tag } => client.upload_docker_image(image, tag).await,
            kind => {
                let file = cache.path_for(self);
                client.upload_component(&self.repository, kind, &file).await
            }
        }
    }

    fn identity(&self) -> (&str, &str, Option<&str>, ArtifactFormat, &str) {
        (
            &self.path,
            &self.name,
            self.content_hash.as_deref(),
            self.format(),
            &self.repository,
        )
    }
}

impl PartialEq for Artifact {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Artifact {}

impl Hash for Artifact {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.repository, self.name)
    }
}

/// Last segment of a download URL
pub fn display_name(download_url: &str) -> String {
    download_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
