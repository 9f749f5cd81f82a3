use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

use pdbmirror_core::TransferJob;

/// Name of the rsync executable looked up on `PATH`.
pub const RSYNC_PROGRAM: &str = "rsync";

/// Flags shared by every transfer.
///
/// * `-r` recurse into directories
/// * `-l` copy symlinks as symlinks
/// * `-p` preserve permissions
/// * `-t` preserve modification times
/// * `-z` compress file data during the transfer
/// * `--delete` delete extraneous files from the destination
pub const MIRROR_FLAGS: [&str; 3] = ["-rlpt", "-z", "--delete"];

/// One overall progress line per transfer instead of one per file.
pub const PROGRESS_FLAG: &str = "--info=progress2";

/// A fully resolved rsync invocation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pdbmirror_core::{plan_transfers, MirrorConfig};
/// use pdbmirror_rsync::RsyncCommand;
///
/// let jobs = plan_transfers(&MirrorConfig::default(), Path::new("."), &[]).unwrap();
/// let command = RsyncCommand::for_job(Path::new("rsync"), &jobs[0]);
/// assert_eq!(
///     command.to_string(),
///     "rsync -rlpt -z --delete --port=33444 --info=progress2 \
///      rsync.rcsb.org::ftp_data/structures/divided/pdb/ ./pdb"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsyncCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl RsyncCommand {
    /// Builds the argv for `job`.
    ///
    /// Protect filters go before the source so they apply to the whole
    /// transfer.
    pub fn for_job(program: &Path, job: &TransferJob) -> Self {
        let mut args: Vec<OsString> = MIRROR_FLAGS.iter().map(OsString::from).collect();
        args.push(format!("--port={}", job.port).into());
        args.push(PROGRESS_FLAG.into());
        for pattern in &job.protect {
            args.push(format!("--filter=protect {}", pattern).into());
        }
        args.push(job.source.clone().into());
        args.push(job.destination.clone().into_os_string());

        Self {
            program: program.to_path_buf(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

/// Renders the command as a copy-pasteable shell line.
impl fmt::Display for RsyncCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(self.program.as_os_str()))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

fn shell_quote(arg: &OsStr) -> String {
    let arg = arg.to_string_lossy();
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+%".contains(c));
    if safe {
        arg.into_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
