//! Random sampling of source articles and staging into the working prefix.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use futures::stream::{self, StreamExt, TryStreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    error::{DigestError, Result},
    storage::{ObjectStore, StorageLocation},
};

const TRANSFER_CONCURRENCY: usize = 2;

/// One document in the source corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleRef {
    pub key: String,
}

impl ArticleRef {
    /// File name used once staged: the key below `source_prefix` with `%`
    /// and `/` percent-escaped, so distinct keys never share a name.
    pub fn staged_name(&self, source_prefix: &str) -> String {
        self.key
            .strip_prefix(source_prefix)
            .unwrap_or(&self.key)
            .replace('%', "%25")
            .replace('/', "%2F")
    }
}

/// Documents copied into the working prefix and the local working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedCorpus {
    pub location: StorageLocation,
    pub keys: Vec<String>,
    pub local_dir: PathBuf,
    pub local_files: Vec<PathBuf>,
}

impl StagedCorpus {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Article keys under `source`, skipping directory placeholders.
pub async fn list_articles(
    store: &dyn ObjectStore,
    source: &StorageLocation,
) -> Result<Vec<ArticleRef>> {
    let keys = store.list(source).await?;
    Ok(keys
        .into_iter()
        .filter(|key| !key.ends_with('/'))
        .map(|key| ArticleRef { key })
        .collect())
}

/// Uniform sample of `count` articles without replacement.
pub fn sample_articles<R: Rng + ?Sized>(
    articles: &[ArticleRef],
    count: usize,
    rng: &mut R,
) -> Result<Vec<ArticleRef>> {
    if count > articles.len() {
        return Err(DigestError::InsufficientData {
            requested: count,
            available: articles.len(),
        });
    }
    Ok(rand::seq::index::sample(rng, articles.len(), count)
        .into_iter()
        .map(|idx| articles[idx].clone())
        .collect())
}

/// Copy `articles` into `local_dir` and under the `work` prefix.
#[instrument(skip(store, articles), fields(count = articles.len()))]
pub async fn stage_articles(
    store: &dyn ObjectStore,
    source: &StorageLocation,
    articles: &[ArticleRef],
    work: &StorageLocation,
    local_dir: &Path,
) -> Result<StagedCorpus> {
    let mut names = HashSet::with_capacity(articles.len());
    for article in articles {
        let name = article.staged_name(&source.prefix);
        if !names.insert(name.clone()) {
            return Err(DigestError::Storage(format!(
                "{} would overwrite staged document {name}",
                article.key
            )));
        }
    }

    tokio::fs::create_dir_all(local_dir).await?;

    let staged: Vec<(String, PathBuf)> = stream::iter(articles.iter().cloned())
        .map(|article| async move {
            let name = article.staged_name(&source.prefix);
            let bytes = store.get(&source.bucket, &article.key).await?;
            let local_path = local_dir.join(&name);
            tokio::fs::write(&local_path, &bytes).await?;
            let key = work.key_for(&name);
            store.put(&work.bucket, &key, bytes).await?;
            info!(source = %article.key, staged = %key, "staged article");
            Ok::<_, DigestError>((key, local_path))
        })
        .buffered(TRANSFER_CONCURRENCY)
        .try_collect()
        .await?;

    let (keys, local_files): (Vec<String>, Vec<PathBuf>) = staged.into_iter().unzip();
    Ok(StagedCorpus {
        location: work.clone(),
        keys,
        local_dir: local_dir.to_path_buf(),
        local_files,
    })
}
