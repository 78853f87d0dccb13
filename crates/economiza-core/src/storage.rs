//! Object storage for uploaded documents and receipts.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::error::StorageError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Path-addressed blob storage.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` and return the stored path.
    async fn upload(&self, bytes: &[u8], path: &str, content_type: &str) -> Result<String>;

    /// Read the object at `path`.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;

    /// Remove the object at `path`.
    async fn delete(&self, path: &str) -> Result<()>;

    /// A URL giving temporary read access to the object.
    async fn presigned_url(&self, path: &str, ttl: Duration) -> Result<String>;
}

/// Object storage in a local directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object path to a file under the root.
    ///
    /// Only plain relative paths are accepted.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.trim().is_empty() || !plain {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn not_found_or_io(path: &str, err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(&self, bytes: &[u8], path: &str, content_type: &str) -> Result<String> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        debug!("Stored {} bytes ({}) at {}", bytes.len(), content_type, target.display());
        Ok(path.to_string())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target)
            .await
            .map_err(|e| not_found_or_io(path, e))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| not_found_or_io(path, e))
    }

    async fn presigned_url(&self, path: &str, ttl: Duration) -> Result<String> {
        let target = self.resolve(path)?;
        if !tokio::fs::try_exists(&target).await? {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let absolute = std::path::absolute(&target)?;
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("file://{}?expires={}", absolute.display(), expires))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_upload_download_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        let path = storage
            .upload(b"boleto", "bills/u1/b1/boleto.txt", "text/plain")
            .await
            .unwrap();
        assert_eq!(path, "bills/u1/b1/boleto.txt");
        assert_eq!(storage.download(&path).await.unwrap(), b"boleto".to_vec());

        let url = storage.presigned_url(&path, Duration::from_secs(60)).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.contains("boleto.txt?expires="));

        storage.delete(&path).await.unwrap();
        assert!(matches!(storage.download(&path).await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        for path in ["", "../secret", "/etc/passwd", "bills/../../x"] {
            assert!(
                matches!(storage.upload(b"x", path, "text/plain").await, Err(StorageError::InvalidPath(_))),
                "{path} should be rejected"
            );
        }
    }
}
