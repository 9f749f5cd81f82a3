use clap::{Args, Parser, Subcommand, ValueEnum};
use pdbmirror_core::{FailurePolicy, MirrorConfig};
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "pdbmirror")]
#[command(
    author,
    version,
    about = "Mirror the wwPDB divided archive (PDB, mmCIF, XML) over rsync"
)]
#[command(after_help = "Examples:
  pdbmirror                               # Same as `pdbmirror mirror`
  pdbmirror mirror                        # Mirror pdb/, mmCIF/ and XML/ into the current directory
  pdbmirror mirror -d pdb --dest /data    # Mirror only the PDB-format tree
  pdbmirror mirror --dry-run              # Print the rsync commands without running them
  pdbmirror status --format json")]
pub struct Config {
    /// Path to a mirror.toml configuration file
    #[arg(long, global = true, env = "PDBMIRROR_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Defaults to `mirror` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    /// Takes the subcommand to run. A bare invocation mirrors every enabled
    /// dataset with default arguments.
    pub fn take_command(&mut self) -> Command {
        self.command
            .take()
            .unwrap_or_else(|| Command::Mirror(MirrorArgs::default()))
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mirror the configured datasets from the rsync server
    #[command(after_help = "Local files that no longer exist on the server are deleted.
Transfers run one after another; by default a failed transfer does not stop the rest.")]
    Mirror(MirrorArgs),
    /// Show what is present in the local mirror directories
    Status {
        /// Directory containing the mirrored datasets
        #[arg(long, env = "PDBMIRROR_DEST", default_value = ".")]
        dest: PathBuf,
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    /// List configured datasets and their rsync sources
    Datasets,
    /// Write a default configuration file
    InitConfig {
        /// Target path (defaults to the user configuration directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Arguments of the `mirror` command
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Mirror only this dataset (repeatable; default: all enabled datasets)
    #[arg(short = 'd', long = "dataset", value_name = "NAME")]
    pub datasets: Vec<String>,

    /// Directory the dataset directories are created in
    #[arg(long, env = "PDBMIRROR_DEST", default_value = ".")]
    pub dest: PathBuf,

    /// Override the rsync server host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the rsync server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Stop after the first failed transfer
    #[arg(long)]
    pub fail_fast: bool,

    /// Print the rsync commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Path to the rsync executable (default: looked up on PATH)
    #[arg(long, value_name = "PATH")]
    pub rsync: Option<PathBuf>,
}

impl Default for MirrorArgs {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            dest: std::env::var_os("PDBMIRROR_DEST")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            host: None,
            port: None,
            fail_fast: false,
            dry_run: false,
            rsync: None,
        }
    }
}

impl MirrorArgs {
    /// Applies command line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut MirrorConfig) {
        if let Some(host) = &self.host {
            config.remote.host = host.clone();
        }
        if let Some(port) = self.port {
            config.remote.port = port;
        }
        if self.fail_fast {
            config.on_failure = FailurePolicy::Abort;
        }
    }
}

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Text,
    /// Pretty-printed JSON array
    Json,
}
