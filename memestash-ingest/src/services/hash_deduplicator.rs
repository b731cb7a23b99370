//! Content-hash deduplication
//!
//! Calculates the SHA-256 hash of a downloaded file and checks whether a
//! record already holds it. The pre-check is advisory: the pending insert
//! that follows is what actually reserves the hash.

use memestash_common::{Error, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

use crate::db::memes;

/// Hash deduplication result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// No stored record has this content
    Unique(String),
    /// Content already stored - discard the new file
    Duplicate { hash: String, existing_id: Uuid },
}

pub struct HashDeduplicator {
    db: SqlitePool,
}

impl HashDeduplicator {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Calculate SHA-256 hash of file
    ///
    /// Reads in 1MB chunks on a blocking worker; returns lowercase hex.
    pub async fn calculate_hash(&self, file_path: &Path) -> Result<String> {
        let path_buf = file_path.to_path_buf();
        tracing::debug!(path = %path_buf.display(), "Calculating SHA-256 hash");

        let hash = tokio::task::spawn_blocking(move || -> Result<String> {
            use std::fs::File;
            use std::io::Read;

            let mut file = File::open(&path_buf).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to open {} for hashing: {}", path_buf.display(), e),
                ))
            })?;

            let mut hasher = Sha256::new();
            let mut buffer = vec![0u8; 1024 * 1024];

            loop {
                let bytes_read = file.read(&mut buffer).map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to read {} for hashing: {}", path_buf.display(), e),
                    ))
                })?;

                if bytes_read == 0 {
                    break;
                }

                hasher.update(&buffer[..bytes_read]);
            }

            Ok(format!("{:x}", hasher.finalize()))
        })
        .await
        .map_err(|e| Error::Internal(format!("Hash calculation task failed: {}", e)))??;

        Ok(hash)
    }

    /// Hash the file and look for a stored record with the same content
    pub async fn check_and_reserve(&self, file_path: &Path) -> Result<DedupOutcome> {
        let hash = self.calculate_hash(file_path).await?;

        match memes::find_by_hash(&self.db, &hash).await? {
            None => {
                tracing::debug!(hash = %hash, "No duplicate hash found");
                Ok(DedupOutcome::Unique(hash))
            }
            Some(existing) => {
                tracing::info!(
                    hash = %hash,
                    path = %file_path.display(),
                    existing_id = %existing.guid,
                    "Duplicate content detected"
                );
                Ok(DedupOutcome::Duplicate {
                    hash,
                    existing_id: existing.guid,
                })
            }
        }
    }

    /// Remove a duplicate's file from the upload directory
    pub async fn discard(&self, file_path: &Path) -> Result<()> {
        match tokio::fs::remove_file(file_path).await {
            Ok(()) => Ok(()),
            // Already gone is as good as removed
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}
