//! CLI entry-point running every stage end to end.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{error, info, instrument};

use crate::{
    cli::{sample, summarize, teardown, topics, Session},
    config::Settings,
    teardown::TeardownReport,
};

/// Args for the `run` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Number of articles to sample (defaults to SAMPLE_SIZE).
    #[arg(long)]
    pub count: Option<usize>,
    /// Number of topics to extract (defaults to NUM_TOPICS).
    #[arg(long)]
    pub num_topics: Option<u32>,
    /// Seed for reproducible sampling and input selection.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Leave the endpoint and staged data in place afterwards.
    #[arg(long)]
    pub keep: bool,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let mut session = Session::open(settings).await?;
    let outcome = stages(&mut session, &args).await;
    if args.keep {
        return outcome;
    }

    if let Err(err) = &outcome {
        error!(%err, "workflow failed; tearing down");
    }
    let cleanup = teardown::execute(&mut session).await;
    settle(outcome, cleanup)
}

/// A stage failure outranks a teardown failure; the latter is only logged then.
fn settle(outcome: Result<()>, cleanup: Result<TeardownReport>) -> Result<()> {
    match (outcome, cleanup) {
        (outcome, Ok(report)) => {
            info!(?report, "resources released");
            outcome
        }
        (Ok(()), Err(err)) => Err(err.context("releasing workflow resources")),
        (Err(err), Err(cleanup_err)) => {
            error!(err = %format!("{cleanup_err:#}"), "teardown after failed workflow also failed");
            Err(err)
        }
    }
}

async fn stages(session: &mut Session, args: &Args) -> Result<()> {
    sample::execute(
        session,
        &sample::Args {
            count: args.count,
            source: None,
            seed: args.seed,
        },
    )
    .await?;

    topics::execute(
        session,
        &topics::Args {
            num_topics: args.num_topics,
            wait: true,
        },
    )
    .await?;

    summarize::execute(
        session,
        &summarize::Args {
            text: None,
            seed: args.seed,
        },
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn stage_error_survives_failed_teardown() {
        let err = settle(
            Err(anyhow!("topic job failed: quota")),
            Err(anyhow!("endpoint delete rejected")),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "topic job failed: quota");
    }

    #[test]
    fn teardown_error_reported_when_stages_succeeded() {
        let err = settle(Ok(()), Err(anyhow!("endpoint delete rejected"))).unwrap_err();
        assert!(format!("{err:#}").contains("endpoint delete rejected"));
    }

    #[test]
    fn stage_error_returned_after_clean_teardown() {
        let err = settle(Err(anyhow!("no staged corpus")), Ok(TeardownReport::default())).unwrap_err();
        assert_eq!(err.to_string(), "no staged corpus");
    }
}
