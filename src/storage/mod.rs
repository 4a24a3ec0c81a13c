//! Object storage abstraction used for the source dataset and the working prefix.

pub mod local;
#[cfg(feature = "aws")]
pub mod s3;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DigestError, Result};

/// A bucket plus key prefix, written as `s3://bucket/prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub bucket: String,
    pub prefix: String,
}

impl StorageLocation {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Key for `name` directly under this prefix.
    pub fn key_for(&self, name: &str) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        let name = name.trim_start_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        }
    }

    /// Location nested one level below this one.
    pub fn child(&self, name: &str) -> Self {
        Self::new(self.bucket.clone(), format!("{}/", self.key_for(name)))
    }

    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix)
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

impl FromStr for StorageLocation {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("s3://")
            .ok_or_else(|| DigestError::InvalidLocation(s.to_string()))?;
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(DigestError::InvalidLocation(s.to_string()));
        }
        Ok(Self::new(bucket, prefix))
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys under `location`, in lexicographic order.
    async fn list(&self, location: &StorageLocation) -> Result<Vec<String>>;

    /// Object contents, or `None` when the key does not exist.
    async fn try_get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()>;

    /// Remove every object under `location`, returning how many were deleted.
    async fn delete_prefix(&self, location: &StorageLocation) -> Result<usize>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.try_get(bucket, key)
            .await?
            .ok_or_else(|| DigestError::Storage(format!("no such key s3://{bucket}/{key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bucket_and_prefix() {
        let loc: StorageLocation = "s3://corpus/articles/2024/".parse().unwrap();
        assert_eq!(loc.bucket, "corpus");
        assert_eq!(loc.prefix, "articles/2024/");
        assert_eq!(loc.key_for("a.txt"), "articles/2024/a.txt");
        assert_eq!(loc.uri(), "s3://corpus/articles/2024/");
    }

    #[test]
    fn bare_bucket_has_empty_prefix() {
        let loc: StorageLocation = "s3://corpus".parse().unwrap();
        assert_eq!(loc.prefix, "");
        assert_eq!(loc.key_for("a.txt"), "a.txt");
        assert_eq!(loc.child("out").prefix, "out/");
    }

    #[test]
    fn rejects_other_schemes() {
        assert!("https://corpus/x".parse::<StorageLocation>().is_err());
        assert!("s3:///x".parse::<StorageLocation>().is_err());
    }
}
