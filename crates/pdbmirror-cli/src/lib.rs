//! pdbmirror CLI - Command-line interface for mirroring the wwPDB archive
//!
//! This crate provides the CLI application that ties together all pdbmirror components.

pub mod config;
pub mod mirror;
pub mod report;

pub use config::{Command, Config, MirrorArgs, OutputFormat};
pub use mirror::{run_mirror, run_mirror_with, user_error};
