//! CLI entry-point for joining result files already on disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{cli::results, config::Settings, join::JoinedTable};

/// Args for the `join` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Path to topic-terms.csv.
    #[arg(long)]
    pub topic_terms: PathBuf,
    /// Path to doc-topics.csv.
    #[arg(long)]
    pub doc_topics: PathBuf,
    /// Output CSV (defaults to outputs/topics_joined.csv).
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let table = JoinedTable::from_files(&args.topic_terms, &args.doc_topics)
        .context("joining topic result files")?;
    let output = args
        .output
        .unwrap_or_else(|| settings.join_output("topics_joined.csv"));
    results::display(&table, &output)
}
