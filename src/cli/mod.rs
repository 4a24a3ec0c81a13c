//! Command-line interface wiring for article-digest.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};

use crate::{backend::Backend, config::Settings, state::RunState};

pub mod join;
pub mod results;
pub mod run;
pub mod sample;
pub mod status;
pub mod summarize;
pub mod teardown;
pub mod topics;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "Sample, topic-model and summarise scientific articles", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Sample(args) => sample::run(args, settings).await,
            Commands::Topics(args) => topics::run(args, settings).await,
            Commands::Status => status::run(settings).await,
            Commands::Results => results::run(settings).await,
            Commands::Join(args) => join::run(args, settings).await,
            Commands::Summarize(args) => summarize::run(args, settings).await,
            Commands::Teardown => teardown::run(settings).await,
            Commands::Run(args) => run::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sample articles from the source dataset and stage them.
    Sample(sample::Args),
    /// Submit a topic modeling job over the staged articles.
    Topics(topics::Args),
    /// Check the submitted topic modeling job once.
    Status,
    /// Download, join and display the results of a completed job.
    Results,
    /// Join local topic-terms and doc-topics files.
    Join(join::Args),
    /// Deploy the summarisation endpoint and summarise one article.
    Summarize(summarize::Args),
    /// Delete the endpoint, staged objects and local copies.
    Teardown,
    /// Run every stage end to end.
    Run(run::Args),
}

/// Settings, connected services and persisted handles for one invocation.
pub struct Session {
    pub settings: Settings,
    pub backend: Backend,
    pub state: RunState,
}

impl Session {
    pub async fn open(settings: Settings) -> Result<Self> {
        let backend = Backend::connect(&settings).await?;
        let state = RunState::load(&settings.state_path())?;
        Ok(Self {
            settings,
            backend,
            state,
        })
    }

    pub fn save(&mut self) -> Result<()> {
        let path = self.settings.state_path();
        self.state.save(&path)?;
        Ok(())
    }
}

/// Seeded RNG when reproducibility is requested, entropy otherwise.
pub(crate) fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Resource names must be unique per run and at most 63 characters.
pub(crate) fn run_name() -> String {
    format!("article-digest-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"))
}
