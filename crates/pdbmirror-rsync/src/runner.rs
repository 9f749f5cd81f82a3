use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use pdbmirror_core::error::AppError;
use pdbmirror_core::{TransferJob, TransferRunner, TransferStatus};
use tokio::process::Command;
use tracing::{debug, info};

use crate::command::{RsyncCommand, RSYNC_PROGRAM};

/// Runs transfers with the system `rsync` binary.
///
/// The child inherits stdout and stderr, so rsync's progress line and its
/// diagnostics go straight to the terminal. The runner only inspects the
/// exit status.
///
/// # Examples
///
/// ```no_run
/// use pdbmirror_core::{plan_transfers, FailurePolicy, MirrorConfig, MirrorService};
/// use pdbmirror_rsync::RsyncRunner;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = MirrorConfig::default();
/// let jobs = plan_transfers(&config, std::path::Path::new("."), &[])?;
/// let service = MirrorService::new(RsyncRunner::locate()?, FailurePolicy::Continue);
/// let summary = service.run(&jobs).await;
/// println!("{} of {} datasets mirrored", summary.successful_count(), summary.total());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RsyncRunner {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl RsyncRunner {
    /// Finds `rsync` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RsyncNotFound` if no executable is found.
    pub fn locate() -> Result<Self, AppError> {
        let program = which::which(RSYNC_PROGRAM).map_err(|_| AppError::RsyncNotFound)?;
        debug!("Using rsync at {}", program.display());
        Ok(Self::with_program(program))
    }

    /// Uses an explicit rsync executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Runs `program` as a launcher with these arguments before the rsync
    /// argv, e.g. `nice -n 19 rsync ...` via
    /// `RsyncRunner::with_program("nice").with_leading_args(["-n", "19", "rsync"])`.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The command that will be executed for `job`.
    pub fn command_for(&self, job: &TransferJob) -> RsyncCommand {
        RsyncCommand::for_job(&self.program, job)
    }
}

impl TransferRunner for RsyncRunner {
    async fn run(&self, job: &TransferJob) -> Result<TransferStatus, AppError> {
        let command = self.command_for(job);
        info!("Running: {}", command);

        let status = Command::new(command.program())
            .args(&self.leading_args)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AppError::RsyncNotFound
                } else {
                    AppError::Io(e)
                }
            })?;

        debug!("{}: rsync exited with {:?}", job.dataset, status.code());
        Ok(TransferStatus { code: status.code() })
    }
}
