//! Filesystem-backed object store: bucket `b`, key `k` lives at `<root>/b/k`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use super::{ObjectStore, StorageLocation};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }

    fn keys_under(&self, location: &StorageLocation) -> Vec<(String, PathBuf)> {
        let bucket_root = self.root.join(&location.bucket);
        if !bucket_root.exists() {
            return Vec::new();
        }
        let mut keys: Vec<(String, PathBuf)> = WalkDir::new(&bucket_root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let key = relative_key(&bucket_root, entry.path())?;
                key.starts_with(&location.prefix)
                    .then(|| (key, entry.into_path()))
            })
            .collect();
        keys.sort();
        keys
    }
}

fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, location: &StorageLocation) -> Result<Vec<String>> {
        Ok(self
            .keys_under(location)
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    async fn try_get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.object_path(bucket, key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        debug!(path = %path.display(), "stored object");
        Ok(())
    }

    async fn delete_prefix(&self, location: &StorageLocation) -> Result<usize> {
        let keys = self.keys_under(location);
        for (_, path) in &keys {
            tokio::fs::remove_file(path).await?;
        }
        Ok(keys.len())
    }
}
