//! Concurrent synchronization engine
//!
//! The [`Coordinator`](coordinator::Coordinator) computes what is missing on
//! the destination and seeds a [`SharedState`](state::SharedState); a pool of
//! [`Worker`](worker::Worker)s per role then drains it until every artifact is
//! uploaded, failed or recorded as corrupted.

pub mod coordinator;
pub mod report;
pub mod state;
pub mod worker;

pub use coordinator::Coordinator;
pub use report::{CorruptedRecord, SyncReport};
pub use state::SharedState;
pub use worker::{Worker, WorkerRole};

use crate::artifact::Artifact;
use crate::catalog::RemoteHash;
use async_trait::async_trait;

/// Transfers the workers drive
///
/// Failures are reported as `false` or as a sentinel hash; they never abort
/// the run.
#[async_trait]
pub trait TransferAgent: Send + Sync {
    /// Fetch `artifact` from the source
    async fn download(&self, artifact: &Artifact) -> bool;

    /// Push `artifact` to the destination
    async fn upload(&self, artifact: &Artifact) -> bool;

    /// Content hash `artifact` ended up with on the destination
    async fn destination_hash(&self, artifact: &Artifact) -> RemoteHash;
}
