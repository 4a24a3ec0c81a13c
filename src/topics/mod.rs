//! Topic-modeling batch job client: submit, query status, retrieve output.

#[cfg(feature = "aws")]
pub mod comprehend;

use std::{
    fmt,
    io::Cursor,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tar::Archive;
use tracing::{info, instrument, warn};

use crate::{
    error::{DigestError, Result},
    retry::{self, Poll, WaitPolicy},
    storage::{ObjectStore, StorageLocation},
};

pub const TOPIC_TERMS_FILE: &str = "topic-terms.csv";
pub const DOC_TOPICS_FILE: &str = "doc-topics.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Submitted => "submitted",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Parameters of one topic detection job.
#[derive(Debug, Clone)]
pub struct TopicJobRequest {
    pub job_name: String,
    pub input: StorageLocation,
    pub output: StorageLocation,
    pub num_topics: u32,
    pub role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub job_name: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescription {
    pub status: JobStatus,
    /// Archive location, present once the job has completed.
    pub output_uri: Option<String>,
    pub message: Option<String>,
}

#[async_trait]
pub trait TopicModeler: Send + Sync {
    /// Start the job and return without waiting for it.
    async fn submit(&self, request: &TopicJobRequest) -> Result<JobHandle>;

    async fn describe(&self, job_id: &str) -> Result<JobDescription>;
}

/// Local copies of the two result tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicOutputFiles {
    pub topic_terms: PathBuf,
    pub doc_topics: PathBuf,
}

fn interpret(job_id: &str, description: JobDescription) -> Result<Poll<String>> {
    match description.status {
        JobStatus::Completed => description
            .output_uri
            .map(Poll::Ready)
            .ok_or_else(|| DigestError::Service(format!("job {job_id} completed without output"))),
        JobStatus::Failed => Err(DigestError::JobFailed {
            job_id: job_id.to_string(),
            message: description
                .message
                .unwrap_or_else(|| "no failure detail reported".to_string()),
        }),
        JobStatus::Submitted | JobStatus::InProgress => Ok(Poll::Pending),
    }
}

/// Single status check. Returns the output archive URI of a completed job.
#[instrument(skip(modeler))]
pub async fn check_job(modeler: &dyn TopicModeler, job_id: &str) -> Result<String> {
    let description = modeler.describe(job_id).await?;
    let status = description.status;
    info!(%status, "topic job status");
    match interpret(job_id, description)? {
        Poll::Ready(uri) => Ok(uri),
        Poll::Pending => Err(DigestError::JobIncomplete {
            job_id: job_id.to_string(),
            status,
        }),
    }
}

/// Poll until the job completes, fails, or `policy` runs out.
#[instrument(skip(modeler))]
pub async fn await_job(
    modeler: &dyn TopicModeler,
    job_id: &str,
    policy: WaitPolicy,
) -> Result<String> {
    retry::poll_until(policy, "topic modeling job", move || async move {
        let description = modeler.describe(job_id).await?;
        info!(status = %description.status, "topic job status");
        interpret(job_id, description)
    })
    .await
}

/// Download the job's `output.tar.gz` and unpack it into `dest_dir`.
#[instrument(skip(store))]
pub async fn fetch_output(
    store: &dyn ObjectStore,
    output_uri: &str,
    dest_dir: &Path,
) -> Result<TopicOutputFiles> {
    let location: StorageLocation = output_uri.parse()?;
    let bytes = store.get(&location.bucket, &location.prefix).await?;
    info!(size = bytes.len(), "downloaded topic output archive");
    unpack_archive(&bytes, dest_dir)
}

/// Unpack a gzipped tarball and locate the two result tables inside it.
pub fn unpack_archive(bytes: &[u8], dest_dir: &Path) -> Result<TopicOutputFiles> {
    std::fs::create_dir_all(dest_dir)?;
    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
    archive.unpack(dest_dir)?;

    let topic_terms = find_file(dest_dir, TOPIC_TERMS_FILE)?;
    let doc_topics = find_file(dest_dir, DOC_TOPICS_FILE)?;
    Ok(TopicOutputFiles {
        topic_terms,
        doc_topics,
    })
}

fn find_file(root: &Path, name: &str) -> Result<PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .map(|entry| entry.into_path())
        .ok_or_else(|| {
            warn!(root = %root.display(), name, "result file missing from archive");
            DigestError::Service(format!("{name} not found in topic output archive"))
        })
}
