//! CLI entry-point for submitting the topic modeling job.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    cli::{results, run_name, Session},
    config::Settings,
    error::DigestError,
    topics::{self, JobHandle, TopicJobRequest},
};

/// Args for the `topics` command.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct Args {
    /// Number of topics to extract (defaults to NUM_TOPICS).
    #[arg(long)]
    pub num_topics: Option<u32>,
    /// Poll until the job finishes, then show the joined results.
    #[arg(long)]
    pub wait: bool,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let mut session = Session::open(settings).await?;
    execute(&mut session, &args).await?;
    Ok(())
}

pub(crate) async fn execute(session: &mut Session, args: &Args) -> Result<JobHandle> {
    let staged = session
        .state
        .staged
        .clone()
        .ok_or(DigestError::MissingState("no staged corpus; run `sample` first"))?;
    let request = TopicJobRequest {
        job_name: run_name(),
        input: staged.location.clone(),
        output: session.settings.topics_output_location(),
        num_topics: args.num_topics.unwrap_or(session.settings.num_topics),
        role_arn: session.settings.comprehend_role()?.to_string(),
    };

    let backend = session.backend.clone();
    let modeler = backend.topics()?;
    let handle = modeler.submit(&request).await?;
    session.state.job = Some(handle.clone());
    session.save()?;
    println!("submitted topic job {} ({})", handle.job_id, handle.job_name);

    if args.wait {
        let output_uri =
            topics::await_job(modeler, &handle.job_id, session.settings.job_wait).await?;
        info!(%output_uri, "topic job completed");
        results::present(session, &output_uri).await?;
    }
    Ok(handle)
}
