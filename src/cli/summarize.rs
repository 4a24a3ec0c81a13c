//! CLI entry-point for deploying the model and summarising one article.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    cli::{rng_from, run_name, Session},
    config::Settings,
    error::DigestError,
    select,
    summarize::{self, EndpointHandle},
};

/// Args for the `summarize` command.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct Args {
    /// Summarise this text instead of selecting from staged articles.
    #[arg(long)]
    pub text: Option<String>,
    /// Seed for reproducible input selection.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let mut session = Session::open(settings).await?;
    execute(&mut session, &args).await?;
    Ok(())
}

pub(crate) async fn execute(session: &mut Session, args: &Args) -> Result<String> {
    let endpoint = ensure_endpoint(session).await?;

    let text = match &args.text {
        Some(text) => text.clone(),
        None => {
            let staged = session
                .state
                .staged
                .as_ref()
                .ok_or(DigestError::MissingState("no staged corpus; run `sample` first"))?;
            let mut rng = rng_from(args.seed);
            select::select_input(
                &staged.local_files,
                &mut rng,
                session.settings.selection_attempts,
            )?
            .text
        }
    };

    let backend = session.backend.clone();
    let summary = summarize::summarize(backend.inference()?, &endpoint, &text)
        .await
        .context("waiting for summary")?;
    println!("Input:\n{text}\n\nSummary:\n{summary}");
    Ok(summary)
}

/// Reuse the recorded endpoint or deploy a new one, then wait until ready.
async fn ensure_endpoint(session: &mut Session) -> Result<EndpointHandle> {
    let backend = session.backend.clone();
    let service = backend.inference()?;

    let handle = match session.state.endpoint.clone() {
        Some(handle) => {
            info!(endpoint = %handle.endpoint_name, "reusing deployed endpoint");
            handle
        }
        None => {
            let spec = session.settings.endpoint_spec(run_name())?;
            let handle = service.deploy(&spec).await?;
            // Record before waiting so teardown can release a failed deployment.
            session.state.endpoint = Some(handle.clone());
            session.save()?;
            handle
        }
    };

    summarize::wait_in_service(service, &handle, session.settings.endpoint_wait).await?;
    Ok(handle)
}
