use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all possible errors that can occur while planning,
/// running or inspecting a mirror. It uses the `thiserror` crate for ergonomic
/// error handling and automatic conversion from underlying library errors.
///
/// # Error Conversion
///
/// Most errors automatically convert from their source types using the `#[from]` attribute:
/// - `std::io::Error` → `AppError::Io`
/// - `toml::de::Error` → `AppError::ConfigParse`
///
/// # Examples
///
/// ```no_run
/// use pdbmirror_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::UnknownDataset("cath".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration parsed but violates an invariant.
    ///
    /// Examples: an empty host, a duplicate dataset name, or a `local_dir`
    /// that escapes the destination root.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A dataset name given on the command line is not in the configuration.
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    /// No `rsync` executable could be found on `PATH`.
    #[error("rsync executable not found on PATH")]
    RsyncNotFound,

    /// An rsync child process exited unsuccessfully.
    ///
    /// `code` is `None` when the process was terminated by a signal.
    #[error("Transfer of '{dataset}' failed: {}", describe_status(.code))]
    TransferFailed { dataset: String, code: Option<i32> },
}

/// rsync exit codes that indicate network or timeout conditions.
const RETRYABLE_RSYNC_CODES: [i32; 6] = [10, 12, 23, 24, 30, 35];

/// Returns the documented meaning of an rsync exit code.
///
/// # Examples
///
/// ```
/// use pdbmirror_core::error::describe_rsync_exit;
///
/// assert_eq!(describe_rsync_exit(10), "error in socket I/O");
/// assert_eq!(describe_rsync_exit(99), "unknown error");
/// ```
pub fn describe_rsync_exit(code: i32) -> &'static str {
    match code {
        0 => "success",
        1 => "syntax or usage error",
        2 => "protocol incompatibility",
        3 => "errors selecting input/output files, dirs",
        4 => "requested action not supported",
        5 => "error starting client-server protocol",
        6 => "daemon unable to append to log-file",
        10 => "error in socket I/O",
        11 => "error in file I/O",
        12 => "error in rsync protocol data stream",
        13 => "errors with program diagnostics",
        14 => "error in IPC code",
        20 => "received SIGUSR1 or SIGINT",
        21 => "some error returned by waitpid()",
        22 => "error allocating core memory buffers",
        23 => "partial transfer due to error",
        24 => "partial transfer due to vanished source files",
        25 => "the --max-delete limit stopped deletions",
        30 => "timeout in data send/receive",
        35 => "timeout waiting for daemon connection",
        _ => "unknown error",
    }
}

fn describe_status(code: &Option<i32>) -> String {
    match *code {
        Some(code) => format!("rsync exited with code {} ({})", code, describe_rsync_exit(code)),
        None => "rsync was terminated by a signal".to_string(),
    }
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    ///
    /// Retryable transfer failures end with a note that re-running the
    /// mirror is safe.
    pub fn user_message(&self) -> String {
        let message = self.base_message();
        if self.is_retryable() {
            format!("{}\n   It is safe to re-run the mirror.", message)
        } else {
            message
        }
    }

    fn base_message(&self) -> String {
        match self {
            AppError::RsyncNotFound => {
                "rsync is not installed or not on PATH.\n   Install it with your package manager (e.g. apt install rsync).".to_string()
            }
            AppError::TransferFailed { dataset, code } => match code {
                Some(10) | Some(35) => format!(
                    "Cannot reach the rsync server while mirroring '{}'.\n   Check your internet connection and that the rsync port (33444 by default) is not blocked.",
                    dataset
                ),
                Some(23) | Some(24) => format!(
                    "Mirror of '{}' is incomplete ({}).\n   Re-run the mirror to pick up the remaining files.",
                    dataset,
                    describe_status(code)
                ),
                Some(30) => format!(
                    "Mirror of '{}' timed out.\n   The server may be overloaded. Try again later.",
                    dataset
                ),
                _ => format!(
                    "Mirror of '{}' failed: {}\n   The local directory may be partially updated.",
                    dataset,
                    describe_status(code)
                ),
            },
            AppError::UnknownDataset(name) => {
                format!(
                    "Unknown dataset: {}\n   Run `pdbmirror datasets` to list configured datasets.",
                    name
                )
            }
            AppError::InvalidConfig(msg) => {
                format!(
                    "Invalid configuration: {}\n   Regenerate a template with `pdbmirror init-config --force`.",
                    msg
                )
            }
            AppError::ConfigParse(e) => {
                format!("Cannot parse config file: {}", e)
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdbmirror_core::error::AppError;
    ///
    /// // Socket errors are retryable
    /// let err = AppError::TransferFailed { dataset: "pdb".to_string(), code: Some(10) };
    /// assert!(err.is_retryable());
    ///
    /// // Usage errors are NOT retryable
    /// let err = AppError::TransferFailed { dataset: "pdb".to_string(), code: Some(1) };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::TransferFailed { code: None, .. } => true,
            AppError::TransferFailed {
                code: Some(code), ..
            } => RETRYABLE_RSYNC_CODES.contains(code),
            _ => false,
        }
    }
}
