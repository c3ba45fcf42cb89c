//! Filesystem-backed object store.
//!
//! Objects live at `<root>/<bucket>/<key>`. Writes go through a temporary
//! file in the destination directory and are renamed into place, so readers
//! never see a partially written object.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::ObjectStore;
use crate::error::StorageError;

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the on-disk path of an object.
    ///
    /// Bucket and key must be relative and free of `..` components.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidLocation(format!("{}/{}", bucket, key));

        if bucket.is_empty() || key.is_empty() {
            return Err(invalid());
        }

        let relative = Path::new(bucket).join(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(invalid());
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).await?;

        let size = data.len();
        let target = path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
            tmp.write_all(&data)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))??;

        tracing::debug!(path = %path.display(), bytes = size, "Object written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_then_get_replaces() {
        let dir = TempDir::new().expect("temp dir");
        let store = LocalObjectStore::new(dir.path());

        store
            .put("bucket", "data/input.csv", b"first".to_vec(), "text/csv")
            .await
            .expect("first put");
        store
            .put("bucket", "data/input.csv", b"second".to_vec(), "text/csv")
            .await
            .expect("second put");

        let bytes = store.get("bucket", "data/input.csv").await.expect("get");
        assert_eq!(bytes, b"second");
        assert!(dir.path().join("bucket/data/input.csv").exists());
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let dir = TempDir::new().expect("temp dir");
        let store = LocalObjectStore::new(dir.path());

        let err = store.get("bucket", "nope.csv").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_object_path_rejects_traversal() {
        let store = LocalObjectStore::new("/srv/objects");
        assert!(store.object_path("bucket", "../etc/passwd").is_err());
        assert!(store.object_path("bucket", "/abs").is_err());
        assert!(store.object_path("", "key").is_err());
        assert_eq!(
            store.object_path("bucket", "a/b.csv").expect("valid"),
            PathBuf::from("/srv/objects/bucket/a/b.csv")
        );
    }
}
