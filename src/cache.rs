//! Local artifact cache
//!
//! Downloaded files live under `<root>/<repository>/<asset path>`. A file that
//! is already there with the expected content hash does not need to be fetched
//! from the source again; it only needs uploading.

use crate::artifact::Artifact;
use crate::digest::DigestUtils;
use crate::error::{Result, SyncError};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// What the cache holds for one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// Nothing on disk at the artifact's path
    Missing,
    /// File on disk with the expected hash
    Hit,
    /// File on disk with a different hash
    Mismatch { on_disk: String },
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `artifact` is stored locally. Only normal path components of the
    /// remote path are kept, so a hostile path cannot escape the root.
    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        let mut path = self.root.clone();
        for part in [artifact.repository.as_str(), artifact.path.as_str()] {
            for component in Path::new(part).components() {
                if let Component::Normal(segment) = component {
                    path.push(segment);
                }
            }
        }
        path
    }

    /// Create the parent directories of the artifact's path and return the path
    pub async fn prepare(&self, artifact: &Artifact) -> Result<PathBuf> {
        let path = self.path_for(artifact);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::io(parent, e))?;
        }
        Ok(path)
    }

    /// Hash of the cached file, if there is one. A path that cannot be
    /// inspected, e.g. one shadowed by a cached file, counts as a miss.
    pub async fn cached_hash(&self, artifact: &Artifact) -> Result<Option<String>> {
        let path = self.path_for(artifact);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(DigestUtils::sha256_file(&path).await?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache entry unreadable, treating as missing");
                Ok(None)
            }
        }
    }

    pub async fn status(&self, artifact: &Artifact) -> Result<CacheStatus> {
        let status = match self.cached_hash(artifact).await? {
            None => CacheStatus::Missing,
            Some(on_disk) => match &artifact.content_hash {
                Some(expected) if DigestUtils::same_digest(expected, &on_disk) => CacheStatus::Hit,
                _ => CacheStatus::Mismatch { on_disk },
            },
        };
        Ok(status)
    }
}
