//! Download and upload workers
//!
//! Both roles run the same loop over their own queue: pop one artifact, take
//! the docker slot if the artifact needs it, transfer, then either hand the
//! artifact on, re-queue it, or give up on it. A role stops once its
//! completed counter reaches its target.

use super::state::SharedState;
use crate::artifact::Artifact;
use crate::error::{Result, SyncError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    Download,
    Upload,
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerRole::Download => f.write_str("download"),
            WorkerRole::Upload => f.write_str("upload"),
        }
    }
}

/// What one iteration of the worker loop did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Queue was empty
    Idle,
    /// Docker artifact put back because another worker holds the slot
    DockerBusy,
    Transferred,
    /// Transfer failed with retry budget left
    Requeued,
    /// Transfer failed with the retry budget spent
    Dropped,
}

pub struct Worker {
    id: usize,
    role: WorkerRole,
    state: Arc<SharedState>,
}

impl Worker {
    pub fn new(id: usize, role: WorkerRole, state: Arc<SharedState>) -> Self {
        Self { id, role, state }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    async fn target(&self) -> usize {
        match self.role {
            WorkerRole::Download => self.state.total_to_download().await,
            WorkerRole::Upload => self.state.total_to_upload().await,
        }
    }

    async fn completed(&self) -> usize {
        match self.role {
            WorkerRole::Download => self.state.downloaded().await,
            WorkerRole::Upload => self.state.uploaded().await,
        }
    }

    /// Whether every artifact of this role has been accounted for
    pub async fn is_done(&self) -> Result<bool> {
        let target = self.target().await;
        let completed = self.completed().await;
        if completed > target {
            return Err(SyncError::CounterDrift(format!(
                "{} workers completed {} transfers against a target of {}",
                self.role, completed, target
            )));
        }
        Ok(completed == target)
    }

    /// Loop until the role's target is met
    pub async fn run(self) -> Result<()> {
        debug!(worker = self.id, role = %self.role, "worker started");
        loop {
            match self.is_done().await {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    error!(worker = self.id, role = %self.role, error = %e, "worker stopping");
                    return Err(e);
                }
            }

            if self.step().await != StepOutcome::Transferred {
                tokio::time::sleep(self.state.idle_backoff()).await;
            }
        }
        debug!(worker = self.id, role = %self.role, "worker finished");
        Ok(())
    }

    /// One pass of the worker protocol
    pub async fn step(&self) -> StepOutcome {
        let Some(mut artifact) = self.dequeue().await else {
            return StepOutcome::Idle;
        };

        let slot = if artifact.is_docker() {
            match self.state.reserve_docker_slot() {
                Some(slot) => Some(slot),
                None => {
                    debug!(worker = self.id, artifact = %artifact, "docker slot busy, putting artifact back");
                    self.enqueue(artifact).await;
                    return StepOutcome::DockerBusy;
                }
            }
        } else {
            None
        };

        let outcome = if self.transfer(&artifact).await {
            info!(worker = self.id, role = %self.role, artifact = %artifact, "transferred");
            self.record_success(artifact).await;
            StepOutcome::Transferred
        } else if artifact.requeue() {
            warn!(
                worker = self.id,
                role = %self.role,
                artifact = %artifact,
                attempt = artifact.times_requeued(),
                "transfer failed, re-queueing"
            );
            self.enqueue(artifact).await;
            StepOutcome::Requeued
        } else {
            error!(worker = self.id, role = %self.role, artifact = %artifact, "transfer failed permanently");
            self.drop_permanently(artifact).await;
            StepOutcome::Dropped
        };

        drop(slot);
        self.state.log_queues().await;
        outcome
    }

    async fn dequeue(&self) -> Option<Artifact> {
        match self.role {
            WorkerRole::Download => self.state.dequeue_download().await,
            WorkerRole::Upload => self.state.dequeue_upload().await,
        }
    }

    async fn enqueue(&self, artifact: Artifact) {
        match self.role {
            WorkerRole::Download => self.state.enqueue_for_download(artifact).await,
            WorkerRole::Upload => self.state.enqueue_for_upload(artifact).await,
        }
    }

    async fn transfer(&self, artifact: &Artifact) -> bool {
        match self.role {
            WorkerRole::Download => self.state.agent().download(artifact).await,
            WorkerRole::Upload => self.state.agent().upload(artifact).await,
        }
    }

    async fn record_success(&self, artifact: Artifact) {
        match self.role {
            WorkerRole::Download => {
                self.state.increment_downloaded().await;
                self.state.enqueue_for_upload(artifact).await;
            }
            WorkerRole::Upload => {
                self.state.increment_uploaded().await;
                self.state.compare_hash(&artifact).await;
            }
        }
    }

    /// A failed download never reaches the upload stage, so it leaves both
    /// targets; a failed upload only leaves the upload target.
    async fn drop_permanently(&self, artifact: Artifact) {
        match self.role {
            WorkerRole::Download => {
                self.state.decrement_total_to_download().await;
                self.state.decrement_total_to_upload().await;
            }
            WorkerRole::Upload => self.state.decrement_total_to_upload().await,
        }
        self.state.enqueue_failed(artifact).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactKind, MAX_REQUEUE};
    use crate::catalog::RemoteHash;
    use crate::sync::TransferAgent;
    use crate::sync::state::Counters;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Agent {
        fail_downloads: bool,
        fail_uploads: bool,
        attempts: AtomicUsize,
        active_docker: AtomicUsize,
        peak_docker: AtomicUsize,
    }

    impl Agent {
        async fn attempt(&self, artifact: &Artifact, succeed: bool) -> bool {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if artifact.is_docker() {
                let active = self.active_docker.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak_docker.fetch_max(active, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.active_docker.fetch_sub(1, Ordering::SeqCst);
            }
            succeed
        }
    }

    #[async_trait]
    impl TransferAgent for Agent {
        async fn download(&self, artifact: &Artifact) -> bool {
            self.attempt(artifact, !self.fail_downloads).await
        }
        async fn upload(&self, artifact: &Artifact) -> bool {
            self.attempt(artifact, !self.fail_uploads).await
        }
        async fn destination_hash(&self, artifact: &Artifact) -> RemoteHash {
            RemoteHash::Found(artifact.content_hash_str().to_string())
        }
    }

    fn raw(name: &str) -> Artifact {
        Artifact::new(
            ArtifactKind::Raw { directory: "bin".into() },
            "raw-hosted",
            format!("bin/{}", name),
            format!("https://s/repository/raw-hosted/bin/{}", name),
            Some(format!("hash-{}", name)),
        )
    }

    fn image(tag: &str) -> Artifact {
        Artifact::new(
            ArtifactKind::Docker { image: "app".into(), tag: tag.into() },
            "docker-hosted",
            format!("v2/app/manifests/{}", tag),
            format!("https://s/repository/docker-hosted/v2/app/manifests/{}", tag),
            Some(format!("hash-{}", tag)),
        )
    }

    fn shared(agent: Agent, downloads: usize, uploads: usize) -> (Arc<SharedState>, Arc<Agent>) {
        let agent = Arc::new(agent);
        let state = SharedState::new(agent.clone(), downloads, uploads).with_idle_backoff(Duration::ZERO);
        (Arc::new(state), agent)
    }

    #[tokio::test]
    async fn test_fourth_failure_drops() {
        let agent = Agent {
            fail_downloads: true,
            ..Agent::default()
        };
        let (state, agent) = shared(agent, 1, 1);
        state.seed(vec![raw("tool")], Vec::new()).await;
        let worker = Worker::new(0, WorkerRole::Download, state.clone());

        for _ in 0..MAX_REQUEUE {
            assert_eq!(worker.step().await, StepOutcome::Requeued);
        }
        assert_eq!(worker.step().await, StepOutcome::Dropped);
        assert_eq!(worker.step().await, StepOutcome::Idle);
        assert_eq!(agent.attempts.load(Ordering::SeqCst), 4);

        let failed = state.failed_artifacts().await;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].times_requeued(), MAX_REQUEUE);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_both_targets() {
        let agent = Agent {
            fail_downloads: true,
            ..Agent::default()
        };
        let (state, _) = shared(agent, 2, 3);
        state.seed(vec![raw("a"), raw("b")], vec![raw("c")]).await;

        Worker::new(0, WorkerRole::Download, state.clone()).run().await.unwrap();

        let counters = state.counters().await;
        assert_eq!(counters.total_to_download, 0);
        assert_eq!(counters.total_to_upload, 1);
        assert_eq!(state.failed_artifacts().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_upload_target_only() {
        let agent = Agent {
            fail_uploads: true,
            ..Agent::default()
        };
        let (state, _) = shared(agent, 0, 1);
        state.seed(Vec::new(), vec![raw("a")]).await;

        Worker::new(0, WorkerRole::Upload, state.clone()).run().await.unwrap();

        assert_eq!(
            state.counters().await,
            Counters {
                total_to_download: 0,
                downloaded: 0,
                total_to_upload: 0,
                uploaded: 0,
            }
        );
        assert_eq!(state.failed_artifacts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_download_hands_off_to_upload() {
        let (state, _) = shared(Agent::default(), 1, 1);
        state.seed(vec![raw("a")], Vec::new()).await;

        let downloader = Worker::new(0, WorkerRole::Download, state.clone());
        assert_eq!(downloader.step().await, StepOutcome::Transferred);
        assert!(downloader.is_done().await.unwrap());

        let uploader = Worker::new(1, WorkerRole::Upload, state.clone());
        assert_eq!(uploader.step().await, StepOutcome::Transferred);
        assert!(uploader.is_done().await.unwrap());
        assert!(state.corrupted_records().await.is_empty());
    }

    #[tokio::test]
    async fn test_docker_contention_requeues_without_spending_budget() {
        let (state, agent) = shared(Agent::default(), 1, 1);
        state.seed(vec![image("1.0")], Vec::new()).await;
        let worker = Worker::new(0, WorkerRole::Download, state.clone());

        let held = state.reserve_docker_slot();
        assert_eq!(worker.step().await, StepOutcome::DockerBusy);
        assert_eq!(agent.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(state.download_queue_len().await, 1);
        drop(held);

        assert_eq!(worker.step().await, StepOutcome::Transferred);
        assert!(!state.docker_slot_held());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_one_docker_transfer_at_a_time() {
        let images: Vec<Artifact> = (0..8).map(|i| image(&format!("{}.0", i))).collect();
        let (state, agent) = shared(Agent::default(), images.len(), images.len());
        state.seed(images, Vec::new()).await;

        let mut handles = Vec::new();
        for id in 0..4 {
            handles.push(tokio::spawn(Worker::new(id, WorkerRole::Download, state.clone()).run()));
            handles.push(tokio::spawn(Worker::new(id, WorkerRole::Upload, state.clone()).run()));
        }
        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        assert_eq!(agent.peak_docker.load(Ordering::SeqCst), 1);
        assert_eq!(state.uploaded().await, 8);
    }

    #[tokio::test]
    async fn test_overshoot_stops_the_worker() {
        let (state, _) = shared(Agent::default(), 0, 0);
        state.increment_downloaded().await;
        let result = Worker::new(0, WorkerRole::Download, state).run().await;
        assert!(matches!(result, Err(SyncError::CounterDrift(_))));
    }
}
