//! CLI entry-point for fetching, joining and displaying topic results.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::instrument;

use crate::{
    cli::Session,
    config::Settings,
    error::DigestError,
    join::JoinedTable,
    topics,
};

const JOINED_FILE: &str = "topics_joined.csv";

#[instrument(skip(settings))]
pub async fn run(settings: Settings) -> Result<()> {
    let session = Session::open(settings).await?;
    let job = session
        .state
        .job
        .clone()
        .ok_or(DigestError::MissingState("no topic job submitted; run `topics` first"))?;
    let output_uri = topics::check_job(session.backend.topics()?, &job.job_id).await?;
    present(&session, &output_uri).await?;
    Ok(())
}

/// Download the archive behind `output_uri`, join it and print the table.
pub(crate) async fn present(session: &Session, output_uri: &str) -> Result<JoinedTable> {
    let files = topics::fetch_output(
        session.backend.store.as_ref(),
        output_uri,
        &session.settings.join_data("topics"),
    )
    .await
    .with_context(|| format!("fetching topic output {output_uri}"))?;
    let table = JoinedTable::from_files(&files.topic_terms, &files.doc_topics)?;
    display(&table, &session.settings.join_output(JOINED_FILE))?;
    Ok(table)
}

pub(crate) fn display(table: &JoinedTable, csv_path: &Path) -> Result<()> {
    table.write_csv(csv_path)?;
    let df = table.to_frame()?;
    println!("{df}");
    println!("joined {} rows -> {}", table.len(), csv_path.display());
    Ok(())
}
