use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use atelier_client::{ApiClient, ClientConfig, DirectoryDownloader, JobResource};
use atelier_core::JobId;
use atelier_jobs::{ArtifactSink, JobPoller, JobState, PollEvent, PollerConfig, progress};
use clap::Parser;
use tracing::{debug, info, warn};

/// Follow a generation or training job until it settles.
#[derive(Debug, Parser)]
#[command(name = "atelier-watch", version)]
struct Cli {
    /// Kind of job to follow.
    #[arg(value_enum)]
    resource: JobResource,

    /// Job id (UUID).
    job_id: JobId,

    /// Download the produced artifacts into DIR once the job settles.
    #[arg(long, value_name = "DIR")]
    download: Option<PathBuf>,

    /// Poll interval; overrides ATELIER_POLL_INTERVAL_MS.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    atelier_observability::init();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("invalid client configuration")?;
    if let Some(ms) = cli.interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }

    let client = ApiClient::new(&config)?;
    let poller = JobPoller::new(
        cli.job_id,
        client.fetcher(cli.resource),
        PollerConfig::default().with_poll_interval(config.poll_interval),
    );
    let mut events = poller.subscribe();
    poller.start()?;

    info!(
        job_id = %cli.job_id,
        resource = cli.resource.path(),
        api_url = %config.api_url,
        "watching job"
    );

    let settled = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(job_id = %cli.job_id, "interrupted; stopping");
                poller.dispose();
                return Ok(ExitCode::SUCCESS);
            }
            event = events.recv() => match event {
                Some(PollEvent::Snapshot(snapshot)) => {
                    let state = snapshot.state();
                    let p = progress(&snapshot);
                    info!(
                        job_id = %cli.job_id,
                        state = %state,
                        produced = p.produced,
                        requested = p.requested,
                        percent = (p.fraction * 100.0).round() as u32,
                        "job progress"
                    );
                    if state.is_terminal() {
                        break snapshot;
                    }
                }
                Some(PollEvent::TransientError(error)) => {
                    debug!(job_id = %cli.job_id, error = %error, "fetch failed; will retry");
                }
                None => anyhow::bail!(
                    "poller for job {} closed before the job settled",
                    cli.job_id
                ),
            },
        }
    };
    poller.dispose();

    if let Some(dir) = cli.download {
        let downloader = DirectoryDownloader::new(client, dir);
        let report = downloader
            .download_all(&settled)
            .await
            .with_context(|| format!("cannot download into {}", downloader.dir().display()))?;

        info!(job_id = %cli.job_id, written = report.written.len(), "artifacts downloaded");
        for (artifact, error) in &report.failures {
            warn!(
                job_id = %cli.job_id,
                part = %artifact.part,
                index = artifact.index,
                error = %error,
                "artifact not downloaded"
            );
        }
    }

    Ok(match settled.state() {
        JobState::Completed => ExitCode::SUCCESS,
        _ => ExitCode::from(1),
    })
}
