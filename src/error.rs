//! Error taxonomy shared by the workflow stages.

use std::time::Duration;

use thiserror::Error;

use crate::topics::JobStatus;

pub type Result<T, E = DigestError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("insufficient source data: requested {requested} articles but only {available} available")]
    InsufficientData { requested: usize, available: usize },

    #[error("topic modeling job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("topic modeling job {job_id} is not complete yet (status: {status})")]
    JobIncomplete { job_id: String, status: JobStatus },

    #[error("timed out waiting for {what} after {attempts} attempts ({interval:?} apart)")]
    WaitTimeout {
        what: String,
        attempts: usize,
        interval: Duration,
    },

    #[error("no staged document contained the selection pattern after {attempts} attempts")]
    PatternNotFound { attempts: usize },

    #[error("endpoint {endpoint} failed: {reason}")]
    EndpointFailed { endpoint: String, reason: String },

    #[error("invalid storage location '{0}'")]
    InvalidLocation(String),

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("missing run state: {0}")]
    MissingState(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}
