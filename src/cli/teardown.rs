//! CLI entry-point for releasing every provisioned resource.

use anyhow::Result;
use tracing::{instrument, warn};

use crate::{
    cli::Session,
    config::Settings,
    teardown::{self, TeardownReport},
};

#[instrument(skip(settings))]
pub async fn run(settings: Settings) -> Result<()> {
    let mut session = Session::open(settings).await?;
    let report = execute(&mut session).await?;
    println!(
        "endpoint deleted: {}, objects deleted: {}, local directories removed: {}",
        report.endpoint_deleted, report.objects_deleted, report.local_dirs_removed
    );
    Ok(())
}

pub(crate) async fn execute(session: &mut Session) -> Result<TeardownReport> {
    let backend = session.backend.clone();
    let handle = session.state.endpoint.clone();
    let endpoint = match (&handle, backend.inference()) {
        (Some(handle), Ok(service)) => Some((service, handle)),
        (Some(handle), Err(err)) => {
            warn!(endpoint = %handle.endpoint_name, %err, "cannot release endpoint from this build");
            None
        }
        (None, _) => None,
    };

    let staged_dir = session.settings.staged_dir();
    let topics_dir = session.settings.join_data("topics");
    let report = teardown::teardown(
        endpoint,
        backend.store.as_ref(),
        &session.settings.work,
        &[staged_dir.as_path(), topics_dir.as_path()],
    )
    .await?;

    if report.endpoint_deleted {
        session.state.endpoint = None;
    }
    session.state.staged = None;
    session.state.job = None;
    session.save()?;
    Ok(report)
}
