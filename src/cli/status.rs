//! CLI entry-point for a single topic job status check.

use anyhow::Result;
use tracing::instrument;

use crate::{cli::Session, config::Settings, error::DigestError};

#[instrument(skip(settings))]
pub async fn run(settings: Settings) -> Result<()> {
    let session = Session::open(settings).await?;
    let job = session
        .state
        .job
        .as_ref()
        .ok_or(DigestError::MissingState("no topic job submitted; run `topics` first"))?;

    let description = session.backend.topics()?.describe(&job.job_id).await?;
    println!("job {}: {}", job.job_id, description.status);
    if let Some(uri) = &description.output_uri {
        println!("output: {uri}");
    }
    if let Some(message) = &description.message {
        println!("message: {message}");
    }
    Ok(())
}
