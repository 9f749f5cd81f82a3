use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use pdbmirror_cli::report::{render_datasets, render_inventory};
use pdbmirror_cli::{run_mirror, user_error, Command, Config, OutputFormat};
use pdbmirror_core::{
    default_config_path, load_mirror_config, scan_all, write_default_config, MirrorConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse command line arguments
    let mut config = Config::parse();

    // Setup logging (stderr to keep stdout for timestamps and reports)
    let level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")?;

    // Execute command (a bare invocation mirrors)
    match config.take_command() {
        Command::Mirror(args) => {
            let mirror_config = load(config.config.as_deref())?;
            run_mirror(mirror_config, &args, &mut std::io::stdout()).await?;
        }
        Command::Status { dest, format } => {
            let mirror_config = load(config.config.as_deref())?;
            show_status(&mirror_config, &dest, format)?;
        }
        Command::Datasets => {
            let mirror_config = load(config.config.as_deref())?;
            println!("{}", render_datasets(&mirror_config));
        }
        Command::InitConfig { path, force } => {
            init_config(path, force)?;
        }
    }

    Ok(())
}

fn load(path: Option<&Path>) -> anyhow::Result<MirrorConfig> {
    load_mirror_config(path).map_err(user_error)
}

/// Show the contents of the local mirror directories
fn show_status(
    mirror_config: &MirrorConfig,
    dest: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let inventories = scan_all(mirror_config, dest).map_err(user_error)?;

    match format {
        OutputFormat::Text => print!("{}", render_inventory(&inventories)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&inventories)?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Write the default configuration template
fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()
            .context("No user configuration directory; pass an explicit PATH")?,
    };

    write_default_config(&path, force)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
