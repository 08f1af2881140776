//! Shared execution state of a sync run
//!
//! Every counter and queue sits behind its own lock, and no operation here
//! ever holds two of them at once. Download and upload workers therefore
//! never contend on each other's counters, and lock ordering cannot deadlock.

use super::TransferAgent;
use super::report::CorruptedRecord;
use crate::artifact::Artifact;
use crate::error::{Result, SyncError};
use crate::queue::WorkQueue;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::{debug, error};

pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Exclusive right to run a docker transfer; released on drop
#[derive(Debug)]
pub struct DockerSlot<'a> {
    _permit: SemaphorePermit<'a>,
}

/// Point-in-time copy of the four counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Counters {
    pub total_to_download: usize,
    pub downloaded: usize,
    pub total_to_upload: usize,
    pub uploaded: usize,
}

pub struct SharedState {
    agent: Arc<dyn TransferAgent>,

    total_to_download: Mutex<usize>,
    downloaded: Mutex<usize>,
    total_to_upload: Mutex<usize>,
    uploaded: Mutex<usize>,

    download_queue: Mutex<WorkQueue<Artifact>>,
    upload_queue: Mutex<WorkQueue<Artifact>>,
    failed_queue: Mutex<WorkQueue<Artifact>>,
    corrupted_queue: Mutex<WorkQueue<CorruptedRecord>>,

    docker_slot: Semaphore,
    idle_backoff: Duration,
}

impl SharedState {
    pub fn new(agent: Arc<dyn TransferAgent>, total_to_download: usize, total_to_upload: usize) -> Self {
        Self {
            agent,
            total_to_download: Mutex::new(total_to_download),
            downloaded: Mutex::new(0),
            total_to_upload: Mutex::new(total_to_upload),
            uploaded: Mutex::new(0),
            download_queue: Mutex::new(WorkQueue::new("Download")),
            upload_queue: Mutex::new(WorkQueue::new("Upload")),
            failed_queue: Mutex::new(WorkQueue::new("Failed")),
            corrupted_queue: Mutex::new(WorkQueue::new("Corrupted")),
            docker_slot: Semaphore::new(1),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }

    pub fn idle_backoff(&self) -> Duration {
        self.idle_backoff
    }

    pub fn agent(&self) -> &dyn TransferAgent {
        self.agent.as_ref()
    }

    pub async fn total_to_download(&self) -> usize {
        *self.total_to_download.lock().await
    }

    pub async fn downloaded(&self) -> usize {
        *self.downloaded.lock().await
    }

    pub async fn total_to_upload(&self) -> usize {
        *self.total_to_upload.lock().await
    }

    pub async fn uploaded(&self) -> usize {
        *self.uploaded.lock().await
    }

    pub async fn counters(&self) -> Counters {
        Counters {
            total_to_download: self.total_to_download().await,
            downloaded: self.downloaded().await,
            total_to_upload: self.total_to_upload().await,
            uploaded: self.uploaded().await,
        }
    }

    pub async fn decrement_total_to_download(&self) {
        decrement(&self.total_to_download, "total_to_download").await;
    }

    pub async fn decrement_total_to_upload(&self) {
        decrement(&self.total_to_upload, "total_to_upload").await;
    }

    pub async fn increment_downloaded(&self) {
        *self.downloaded.lock().await += 1;
    }

    pub async fn increment_uploaded(&self) {
        *self.uploaded.lock().await += 1;
    }

    /// Fill the download and upload queues before any worker starts
    pub async fn seed(&self, downloads: Vec<Artifact>, uploads: Vec<Artifact>) {
        self.download_queue.lock().await.enqueue_all(downloads);
        self.upload_queue.lock().await.enqueue_all(uploads);
    }

    pub async fn enqueue_for_download(&self, artifact: Artifact) {
        self.download_queue.lock().await.enqueue(artifact);
    }

    pub async fn enqueue_for_upload(&self, artifact: Artifact) {
        self.upload_queue.lock().await.enqueue(artifact);
    }

    pub async fn enqueue_failed(&self, artifact: Artifact) {
        self.failed_queue.lock().await.enqueue(artifact);
    }

    pub async fn dequeue_download(&self) -> Option<Artifact> {
        self.download_queue.lock().await.dequeue()
    }

    pub async fn dequeue_upload(&self) -> Option<Artifact> {
        self.upload_queue.lock().await.dequeue()
    }

    pub async fn download_queue_len(&self) -> usize {
        self.download_queue.lock().await.len()
    }

    pub async fn upload_queue_len(&self) -> usize {
        self.upload_queue.lock().await.len()
    }

    /// Check the uploaded artifact's hash on the destination. A mismatch, or a
    /// hash that could not be resolved, is recorded as corrupted and never
    /// retried. Returns whether the hashes agreed.
    pub async fn compare_hash(&self, artifact: &Artifact) -> bool {
        let destination_hash = self.agent.destination_hash(artifact).await;
        if destination_hash.matches(artifact.content_hash.as_deref()) {
            return true;
        }

        error!(
            artifact = %artifact,
            source = artifact.content_hash_str(),
            destination = %destination_hash,
            "hash mismatch after upload"
        );
        let record = CorruptedRecord {
            artifact: artifact.clone(),
            source_hash: artifact.content_hash.clone(),
            destination_hash,
        };
        self.corrupted_queue.lock().await.enqueue(record);
        false
    }

    /// Take the docker slot if nobody holds it. Never waits.
    pub fn reserve_docker_slot(&self) -> Option<DockerSlot<'_>> {
        self.docker_slot
            .try_acquire()
            .ok()
            .map(|permit| DockerSlot { _permit: permit })
    }

    pub fn docker_slot_held(&self) -> bool {
        self.docker_slot.available_permits() == 0
    }

    /// Failed artifacts, most recent first
    pub async fn failed_artifacts(&self) -> Vec<Artifact> {
        self.failed_queue.lock().await.snapshot()
    }

    /// Corrupted records, most recent first
    pub async fn corrupted_records(&self) -> Vec<CorruptedRecord> {
        self.corrupted_queue.lock().await.snapshot()
    }

    /// Targets must match the seeded work exactly, or the workers' stop
    /// condition can never be reached.
    pub async fn verify_pairing(&self) -> Result<()> {
        let downloads = self.download_queue_len().await;
        let uploads = self.upload_queue_len().await;
        let total_to_download = self.total_to_download().await;
        let total_to_upload = self.total_to_upload().await;

        if total_to_download != downloads {
            return Err(SyncError::CounterDrift(format!(
                "{} downloads targeted but {} queued",
                total_to_download, downloads
            )));
        }
        if total_to_upload != downloads + uploads {
            return Err(SyncError::CounterDrift(format!(
                "{} uploads targeted but {} queued for upload and {} for download",
                total_to_upload, uploads, downloads
            )));
        }
        Ok(())
    }

    /// Debug dump of the pending queues and counters
    pub async fn log_queues(&self) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let downloads: Vec<String> = self.download_queue.lock().await.iter().map(|a| a.name.clone()).collect();
        let uploads: Vec<String> = self.upload_queue.lock().await.iter().map(|a| a.name.clone()).collect();
        let counters = self.counters().await;
        debug!(
            download_queue = ?downloads,
            upload_queue = ?uploads,
            total_to_download = counters.total_to_download,
            downloaded = counters.downloaded,
            total_to_upload = counters.total_to_upload,
            uploaded = counters.uploaded,
            "queue state"
        );
    }
}

async fn decrement(counter: &Mutex<usize>, name: &str) {
    let mut value = counter.lock().await;
    match value.checked_sub(1) {
        Some(next) => *value = next,
        None => error!(counter = name, "attempted to decrement a counter below zero"),
    }
}
