//! Release the endpoint, the staged objects and the local working copies.

use std::path::Path;

use tracing::{info, instrument};

use crate::{
    error::Result,
    storage::{ObjectStore, StorageLocation},
    summarize::{EndpointHandle, InferenceService},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub endpoint_deleted: bool,
    pub objects_deleted: usize,
    pub local_dirs_removed: usize,
}

/// Endpoint first, then the working prefix, then local directories.
/// Safe to run repeatedly: missing resources are skipped, not errors.
#[instrument(skip(endpoint, store))]
pub async fn teardown(
    endpoint: Option<(&dyn InferenceService, &EndpointHandle)>,
    store: &dyn ObjectStore,
    work: &StorageLocation,
    local_dirs: &[&Path],
) -> Result<TeardownReport> {
    let mut report = TeardownReport::default();

    if let Some((service, handle)) = endpoint {
        service.delete(handle).await?;
        report.endpoint_deleted = true;
    }

    report.objects_deleted = store.delete_prefix(work).await?;

    for dir in local_dirs {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => report.local_dirs_removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }

    info!(?report, "teardown complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::local::LocalObjectStore;

    #[tokio::test]
    async fn second_teardown_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("store"));
        let work = StorageLocation::new("work", "digest/");
        store.put("work", "digest/staged/a.txt", b"a".to_vec()).await.unwrap();
        store.put("work", "keep/b.txt", b"b".to_vec()).await.unwrap();
        let local = dir.path().join("staged");
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("a.txt"), "a").unwrap();

        let missing = dir.path().join("never-created");
        let dirs = [local.as_path(), missing.as_path()];

        let first = teardown(None, &store, &work, &dirs).await.unwrap();
        assert_eq!(first.objects_deleted, 1);
        assert_eq!(first.local_dirs_removed, 1);
        assert!(!local.exists());

        let second = teardown(None, &store, &work, &dirs).await.unwrap();
        assert_eq!(second, TeardownReport::default());
        assert_eq!(store.get("work", "keep/b.txt").await.unwrap(), b"b");
    }
}
