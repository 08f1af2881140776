//! Sync coordinator
//!
//! Owns the plan of a run: the repositories both registries share, the
//! artifacts missing on the destination, and which of those already sit in
//! the local cache. It then drives the worker pool and collects the report.

use super::report::SyncReport;
use super::state::SharedState;
use super::worker::{Worker, WorkerRole};
use super::TransferAgent;
use crate::artifact::Artifact;
use crate::cache::{CacheStatus, LocalCache};
use crate::catalog::{Catalog, RemoteHash};
use crate::disk::DiskGate;
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::repository::{Repository, shared_repositories};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

pub struct Coordinator {
    source: Catalog,
    destination: Catalog,
    cache: LocalCache,
    parallelization: usize,
    logger: Logger,

    shared_repositories: Vec<Repository>,
    download_list: Vec<Artifact>,
    upload_list: Vec<Artifact>,
    skipped: Vec<Artifact>,
}

impl Coordinator {
    pub fn new(source: Catalog, destination: Catalog, cache: LocalCache, parallelization: usize, logger: Logger) -> Self {
        Self {
            source,
            destination,
            cache,
            parallelization: parallelization.max(1),
            logger,
            shared_repositories: Vec::new(),
            download_list: Vec::new(),
            upload_list: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn shared_repositories(&self) -> &[Repository] {
        &self.shared_repositories
    }

    pub fn download_list(&self) -> &[Artifact] {
        &self.download_list
    }

    pub fn upload_list(&self) -> &[Artifact] {
        &self.upload_list
    }

    /// Source artifacts already present on the destination
    pub fn skipped(&self) -> &[Artifact] {
        &self.skipped
    }

    pub fn download_count(&self) -> usize {
        self.download_list.len()
    }

    /// Every download is uploaded afterwards, on top of the cached artifacts
    pub fn upload_count(&self) -> usize {
        self.upload_list.len() + self.download_count()
    }

    pub fn required_space(&self) -> u64 {
        DiskGate::required_space(&self.download_list)
    }

    /// Both registries must accept the configured credentials
    pub async fn verify_connections(&self) -> Result<()> {
        self.source.verify_connection().await?;
        self.destination.verify_connection().await
    }

    pub async fn compute_shared_registries(&mut self) -> Result<&[Repository]> {
        let shared = self
            .logger
            .timed("repository compare", async {
                let source = self.source.fetch_repositories().await?;
                let destination = self.destination.fetch_repositories().await?;
                Ok::<_, SyncError>(shared_repositories(&source, &destination))
            })
            .await?;

        self.logger.subsection("Sync will take place between the following repositories:");
        self.logger.detail("(a missing repository is filtered out or absent on one side)");
        for repository in &shared {
            self.logger.info(&format!("{} (format: {})", repository.name, repository.format));
        }

        self.shared_repositories = shared;
        Ok(&self.shared_repositories)
    }

    pub async fn compute_sync_set(&mut self) -> Result<()> {
        let source_list = self
            .logger
            .timed("source list creation", Self::fetch_artifact_list(&self.source, &self.shared_repositories))
            .await?;
        let destination_list = self
            .logger
            .timed(
                "destination list creation",
                Self::fetch_artifact_list(&self.destination, &self.shared_repositories),
            )
            .await?;

        let (missing, skipped) = self
            .logger
            .timed("list dedupping", async {
                let (missing, skipped) = missing_artifacts(source_list, &destination_list);
                let mut downloads = Vec::new();
                let mut uploads = Vec::new();
                for artifact in missing {
                    if self.is_cached(&artifact).await? {
                        uploads.push(artifact);
                    } else {
                        downloads.push(artifact);
                    }
                }
                Ok::<_, SyncError>(((downloads, uploads), skipped))
            })
            .await?;

        (self.download_list, self.upload_list) = missing;
        self.skipped = skipped;

        let skipped: Vec<String> = self.skipped.iter().map(ToString::to_string).collect();
        self.logger.summary(
            "Skipping the following items since they already exist in the destination:",
            &skipped,
        );
        self.logger.info(&format!("Total Items to Download: {}", self.download_count()));
        self.logger.info(&format!("Total Items to Upload: {}", self.upload_count()));
        Ok(())
    }

    async fn fetch_artifact_list(catalog: &Catalog, repositories: &[Repository]) -> Result<Vec<Artifact>> {
        let filled = catalog.fetch_artifact_metadata(repositories).await?;
        Ok(catalog.list_to_sync(filled))
    }

    async fn is_cached(&self, artifact: &Artifact) -> Result<bool> {
        match self.cache.status(artifact).await? {
            CacheStatus::Hit => {
                self.logger.detail(&format!(
                    "Skipping {} download since it is already cached on disk",
                    artifact.name
                ));
                Ok(true)
            }
            CacheStatus::Mismatch { on_disk } => {
                self.logger.warning(&format!(
                    "A copy of {} was found on disk but with a different hash: {}",
                    artifact.name, on_disk
                ));
                self.logger.detail(&format!("Re-downloading {} from source", artifact.name));
                Ok(false)
            }
            CacheStatus::Missing => Ok(false),
        }
    }

    pub async fn populate_queues(&self, state: &SharedState) {
        self.logger
            .timed(
                "filling queues",
                state.seed(self.download_list.clone(), self.upload_list.clone()),
            )
            .await;
    }

    /// Run the worker pool to completion and report what failed. Workers
    /// that stop early are listed in the report rather than failing the call.
    pub async fn run_sync(&self, state: Arc<SharedState>) -> SyncReport {
        let started = Instant::now();

        let results = self
            .logger
            .timed("sync", async {
                let mut handles = Vec::with_capacity(self.parallelization * 2);
                for id in 0..self.parallelization {
                    handles.push(tokio::spawn(
                        Worker::new(id, WorkerRole::Download, state.clone()).run(),
                    ));
                }
                for id in 0..self.parallelization {
                    handles.push(tokio::spawn(
                        Worker::new(id, WorkerRole::Upload, state.clone()).run(),
                    ));
                }
                futures::future::join_all(handles).await
            })
            .await;

        let mut worker_errors = Vec::new();
        for result in results {
            let outcome = result
                .map_err(|e| SyncError::Transfer(format!("worker task failed: {}", e)))
                .and_then(|worker| worker);
            if let Err(e) = outcome {
                self.logger.error(&e.to_string());
                worker_errors.push(e.to_string());
            }
        }

        let report = SyncReport {
            downloaded: state.downloaded().await,
            uploaded: state.uploaded().await,
            failed: state.failed_artifacts().await,
            corrupted: state.corrupted_records().await,
            worker_errors,
            elapsed: started.elapsed(),
        };
        report.print(&self.logger);
        report
    }
}

#[async_trait]
impl TransferAgent for Coordinator {
    async fn download(&self, artifact: &Artifact) -> bool {
        self.source.download(artifact).await
    }

    async fn upload(&self, artifact: &Artifact) -> bool {
        self.destination.upload(artifact).await
    }

    async fn destination_hash(&self, artifact: &Artifact) -> RemoteHash {
        self.destination.resolve_remote_hash(artifact).await
    }
}

/// Split `source` into artifacts absent from `destination` (first occurrence
/// only, source order kept) and those already there.
pub fn missing_artifacts(source: Vec<Artifact>, destination: &[Artifact]) -> (Vec<Artifact>, Vec<Artifact>) {
    let present: HashSet<&Artifact> = destination.iter().collect();
    let mut seen: HashSet<Artifact> = HashSet::new();
    let mut missing = Vec::new();
    let mut skipped = Vec::new();

    for artifact in source {
        if present.contains(&artifact) {
            skipped.push(artifact);
        } else if !seen.contains(&artifact) {
            seen.insert(artifact.clone());
            missing.push(artifact);
        }
    }
    (missing, skipped)
}
