//! Attachment blob storage
//!
//! Metadata lives in the `attachments` table; bytes go through an
//! [`AttachmentStore`] keyed by an opaque storage key.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use stagehand_common::{Error, Result};
use tracing::{debug, warn};

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store `bytes` under `key`, replacing anything already there
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch the bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the blob; a missing blob is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Stores blobs as files in one directory
#[derive(Debug, Clone)]
pub struct LocalAttachmentStore {
    dir: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the storage directory if needed
    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are generated UUIDs; anything else could escape the directory
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidInput(format!("Invalid storage key: {}", key)));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Attachment content {} is missing", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already absent", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalAttachmentStore::new(dir.path().join("blobs"));

        store.put("abc-123", b"rider v2").await.unwrap();
        assert_eq!(store.get("abc-123").await.unwrap(), b"rider v2");

        store.delete("abc-123").await.unwrap();
        assert!(matches!(
            store.get("abc-123").await,
            Err(Error::NotFound(_))
        ));

        // Deleting again is fine
        store.delete("abc-123").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalAttachmentStore::new(dir.path());

        assert!(store.put("../escape", b"x").await.is_err());
        assert!(store.get("a/b").await.is_err());
        assert!(store.put("", b"x").await.is_err());
    }
}
