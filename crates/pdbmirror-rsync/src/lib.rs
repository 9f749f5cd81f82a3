//! pdbmirror rsync - Process plumbing for mirror transfers
//!
//! This crate turns planned transfer jobs into rsync invocations:
//!
//! - [`command`] - exact argv construction and dry-run rendering
//! - [`runner`] - locating `rsync` and running it as a child process

pub mod command;
pub mod runner;

pub use command::{RsyncCommand, MIRROR_FLAGS, PROGRESS_FLAG, RSYNC_PROGRAM};
pub use runner::RsyncRunner;
