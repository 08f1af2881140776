//! Disk admission control
//!
//! Before any worker starts, the summed size of everything that will be
//! downloaded must fit in the free space of the filesystem holding the cache.

use crate::artifact::Artifact;
use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};
use sysinfo::Disks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskGate {
    pub required: u64,
    pub available: u64,
}

impl DiskGate {
    pub fn new(required: u64, available: u64) -> Self {
        Self { required, available }
    }

    pub fn required_space(artifacts: &[Artifact]) -> u64 {
        artifacts.iter().map(|a| a.file_size).sum()
    }

    /// Free bytes on the filesystem holding `location`; the disk with the
    /// longest mount point that prefixes the path wins.
    pub fn available_space(location: &Path) -> Result<u64> {
        let target = absolute(location);
        let disks = Disks::new_with_refreshed_list();

        disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
            .ok_or_else(|| {
                SyncError::Configuration(format!(
                    "Could not determine free disk space for {}",
                    target.display()
                ))
            })
    }

    pub fn is_adequate(&self) -> bool {
        self.available > self.required
    }

    pub fn ensure_adequate(&self) -> Result<()> {
        if self.is_adequate() {
            Ok(())
        } else {
            Err(SyncError::InsufficientDiskSpace {
                required: self.required,
                available: self.available,
            })
        }
    }
}

fn absolute(location: &Path) -> PathBuf {
    std::fs::canonicalize(location).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(location))
            .unwrap_or_else(|_| location.to_path_buf())
    })
}
