//! CLI entry-point for sampling and staging source articles.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    cli::{rng_from, Session},
    config::Settings,
    sampler::{self, StagedCorpus},
    storage::StorageLocation,
};

/// Args for the `sample` command.
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct Args {
    /// Number of articles to sample (defaults to SAMPLE_SIZE).
    #[arg(long)]
    pub count: Option<usize>,
    /// Source location override, e.g. s3://bucket/prefix/.
    #[arg(long)]
    pub source: Option<String>,
    /// Seed for reproducible sampling.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let mut session = Session::open(settings).await?;
    let staged = execute(&mut session, &args).await?;
    println!(
        "staged {} articles under {}",
        staged.len(),
        staged.location
    );
    Ok(())
}

pub(crate) async fn execute(session: &mut Session, args: &Args) -> Result<StagedCorpus> {
    let source: StorageLocation = match &args.source {
        Some(uri) => uri.parse().context("parsing --source")?,
        None => session.settings.source.clone(),
    };
    let count = args.count.unwrap_or(session.settings.sample_size);
    let store = session.backend.store.clone();

    let articles = sampler::list_articles(store.as_ref(), &source)
        .await
        .with_context(|| format!("listing {source}"))?;
    info!(available = articles.len(), count, %source, "listed source articles");

    let picked = {
        let mut rng = rng_from(args.seed);
        sampler::sample_articles(&articles, count, &mut rng)?
    };

    let staged = sampler::stage_articles(
        store.as_ref(),
        &source,
        &picked,
        &session.settings.staged_location(),
        &session.settings.staged_dir(),
    )
    .await
    .context("staging sampled articles")?;

    session.state.staged = Some(staged.clone());
    session.save()?;
    Ok(staged)
}
