//! Registry Sync Library
//!
//! Library root for the registry-sync crate: compares two Nexus registries,
//! copies the artifacts the destination is missing through a pool of
//! download and upload workers, and verifies every upload by content hash.

pub mod artifact;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod digest;
pub mod disk;
pub mod error;
pub mod logging;
pub mod queue;
pub mod registry;
pub mod repository;
pub mod sync;

pub use artifact::{Artifact, ArtifactFormat, ArtifactKind};
pub use catalog::{Catalog, RemoteHash};
pub use error::{Result, SyncError};
pub use logging::Logger;
pub use registry::RegistryClient;
pub use sync::{Coordinator, SharedState, SyncReport};
