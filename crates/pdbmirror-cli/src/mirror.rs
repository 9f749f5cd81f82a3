//! The `mirror` command: plan, run and report one mirror pass.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail};
use chrono::Local;
use tracing::{info, warn};

use pdbmirror_core::{
    plan_transfers, AppError, MirrorConfig, MirrorRunSummary, MirrorService, TransferJob,
    TransferRunner,
};
use pdbmirror_rsync::{RsyncCommand, RsyncRunner, RSYNC_PROGRAM};

use crate::config::MirrorArgs;
use crate::report::render_summary;

/// Converts a core error into an anyhow error carrying the CLI hint.
pub fn user_error(err: AppError) -> anyhow::Error {
    anyhow!(err.user_message())
}

/// Mirrors the selected datasets one after another with the system rsync.
///
/// `Started:` and `Finished:` timestamps are written to `out`. With
/// `--dry-run` the rsync command lines are written instead and nothing runs.
///
/// # Errors
///
/// Fails on an invalid configuration, a missing rsync binary, or when any
/// transfer failed or was skipped.
pub async fn run_mirror<W: Write>(
    config: MirrorConfig,
    args: &MirrorArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    if args.dry_run {
        let (_, jobs) = plan(config, args)?;
        let program = args
            .rsync
            .clone()
            .unwrap_or_else(|| PathBuf::from(RSYNC_PROGRAM));
        for job in &jobs {
            writeln!(out, "{}", RsyncCommand::for_job(&program, job))?;
        }
        return Ok(());
    }

    let runner = match &args.rsync {
        Some(program) => RsyncRunner::with_program(program),
        None => RsyncRunner::locate().map_err(user_error)?,
    };
    run_mirror_with(runner, config, args, out).await
}

/// Same as [`run_mirror`] with an explicit transfer runner. `args.dry_run`
/// and `args.rsync` are ignored.
pub async fn run_mirror_with<R, W>(
    runner: R,
    config: MirrorConfig,
    args: &MirrorArgs,
    out: &mut W,
) -> anyhow::Result<()>
where
    R: TransferRunner,
    W: Write,
{
    let (config, jobs) = plan(config, args)?;

    info!(
        "Mirroring {} dataset(s) from {}:{} into {}",
        jobs.len(),
        config.remote.host,
        config.remote.port,
        args.dest.display()
    );

    writeln!(out, "Started: {}", Local::now().to_rfc2822())?;
    let service = MirrorService::new(runner, config.on_failure);
    let summary = service.run(&jobs).await;
    writeln!(out, "Finished: {}", Local::now().to_rfc2822())?;

    eprintln!("{}", render_summary(&summary));
    ensure_complete(&summary)
}

fn plan(
    mut config: MirrorConfig,
    args: &MirrorArgs,
) -> anyhow::Result<(MirrorConfig, Vec<TransferJob>)> {
    args.apply_overrides(&mut config);
    config.validate().map_err(user_error)?;
    let jobs = plan_transfers(&config, &args.dest, &args.datasets).map_err(user_error)?;
    Ok((config, jobs))
}

fn ensure_complete(summary: &MirrorRunSummary) -> anyhow::Result<()> {
    if summary.is_complete() {
        return Ok(());
    }
    for result in summary.results.iter().filter(|r| r.error.is_some()) {
        warn!(
            "{} may be partially updated: {}",
            result.destination.display(),
            result.error.as_deref().unwrap_or_default()
        );
    }
    bail!(
        "{} of {} transfers did not complete",
        summary.total() - summary.successful_count(),
        summary.total()
    );
}
