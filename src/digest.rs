//! SHA256 digest utilities
//!
//! Content hashes reported by the registry are lowercase hex SHA256 digests;
//! these helpers compute the same representation for bytes and local files.

use crate::error::{Result, SyncError};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Utilities for working with SHA256 digests
pub struct DigestUtils;

impl DigestUtils {
    /// Compute SHA256 digest from byte data
    pub fn compute_sha256(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Compute the SHA256 digest of a file without loading it into memory
    pub async fn sha256_file(path: &Path) -> Result<String> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| SyncError::io(path, e))?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let read = file
                .read(&mut buffer)
                .await
                .map_err(|e| SyncError::io(path, e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Hex digests compare case-insensitively
    pub fn same_digest(left: &str, right: &str) -> bool {
        left.eq_ignore_ascii_case(right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_sha256() {
        let digest = DigestUtils::compute_sha256(b"hello world");
        assert_eq!(digest, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
    }

    #[test]
    fn test_empty_digest() {
        assert_eq!(
            DigestUtils::compute_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_file_digest_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let data = vec![7u8; READ_BUFFER_SIZE * 2 + 17];
        std::fs::write(&path, &data).unwrap();

        let digest = DigestUtils::sha256_file(&path).await.unwrap();
        assert_eq!(digest, DigestUtils::compute_sha256(&data));
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let err = DigestUtils::sha256_file(Path::new("/definitely/not/here")).await.unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here"));
    }

    #[test]
    fn test_same_digest_ignores_case() {
        assert!(DigestUtils::same_digest("ABCDEF", "abcdef"));
        assert!(!DigestUtils::same_digest("abcdef", "abcdee"));
    }
}
