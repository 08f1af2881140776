//! Outcome of a sync run

use crate::artifact::Artifact;
use crate::catalog::RemoteHash;
use crate::error::SyncError;
use crate::logging::Logger;
use serde::Serialize;
use std::time::Duration;

/// An uploaded artifact whose destination hash disagrees with the source
#[derive(Debug, Clone, Serialize)]
pub struct CorruptedRecord {
    pub artifact: Artifact,
    pub source_hash: Option<String>,
    pub destination_hash: RemoteHash,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub downloaded: usize,
    pub uploaded: usize,
    pub failed: Vec<Artifact>,
    pub corrupted: Vec<CorruptedRecord>,
    /// Workers that stopped before their target was met
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub worker_errors: Vec<String>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

fn as_secs<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.corrupted.is_empty() && self.worker_errors.is_empty()
    }

    /// Error for the run as a whole when any worker stopped early
    pub fn worker_failure(&self) -> Option<SyncError> {
        if self.worker_errors.is_empty() {
            return None;
        }
        Some(SyncError::Transfer(format!(
            "{} worker(s) stopped early: {}",
            self.worker_errors.len(),
            self.worker_errors.join("; ")
        )))
    }

    pub fn print(&self, logger: &Logger) {
        logger.summary_kv(
            "Sync Summary",
            &[
                ("Downloaded", self.downloaded.to_string()),
                ("Uploaded", self.uploaded.to_string()),
                ("Failed", self.failed.len().to_string()),
                ("Corrupted", self.corrupted.len().to_string()),
                ("Duration", logger.format_duration(self.elapsed)),
            ],
        );

        let failed: Vec<String> = self.failed.iter().map(|a| a.download_url.clone()).collect();
        logger.summary("Failed to sync the following items:", &failed);

        let corrupted: Vec<String> = self
            .corrupted
            .iter()
            .map(|record| {
                format!(
                    "{}\n    - source:      {}\n    - destination: {}",
                    record.artifact.download_url,
                    record.source_hash.as_deref().unwrap_or(""),
                    record.destination_hash
                )
            })
            .collect();
        logger.summary("The following items have a different hash after copy:", &corrupted);
        logger.summary("The following workers stopped early:", &self.worker_errors);

        if self.is_clean() {
            logger.success("All artifacts synced and verified");
        }
    }
}
