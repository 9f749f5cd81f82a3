//! Metadata fingerprints of local mirror trees.
//!
//! A fingerprint hashes every regular file and symlink's relative path,
//! size and modification time. rsync preserves mtimes (`-t`), so two
//! fingerprints taken around a transfer are equal exactly when the
//! transfer left the tree alone. File contents are never read.

use std::path::Path;
use std::time::UNIX_EPOCH;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::AppError;

/// Summary of a directory tree at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFingerprint {
    /// Number of regular files and symlinks.
    pub files: u64,
    /// Sum of file sizes in bytes.
    pub bytes: u64,
    /// Hex SHA-256 over the sorted (path, size, mtime) entries.
    pub digest: String,
}

impl TreeFingerprint {
    /// Fingerprint of a tree with no files.
    pub fn empty() -> Self {
        Self {
            files: 0,
            bytes: 0,
            digest: hex_digest(Sha256::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files == 0
    }
}

/// Computes the fingerprint of `root`.
///
/// A missing `root` yields [`TreeFingerprint::empty`]. Symlinks are not
/// followed; their own metadata is recorded.
pub fn fingerprint_tree(root: &Path) -> Result<TreeFingerprint, AppError> {
    if !root.exists() {
        return Ok(TreeFingerprint::empty());
    }

    let mut hasher = Sha256::new();
    let mut files = 0u64;
    let mut bytes = 0u64;

    // sort_by_file_name gives a stable walk order across runs
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| AppError::Io(e.into()))?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| AppError::Io(e.into()))?;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or_default();

        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        hasher.update(metadata.len().to_le_bytes());
        hasher.update(mtime.to_le_bytes());
        hasher.update([u8::from(file_type.is_symlink())]);

        files += 1;
        bytes += metadata.len();
    }

    Ok(TreeFingerprint {
        files,
        bytes,
        digest: hex_digest(hasher),
    })
}

fn hex_digest(hasher: Sha256) -> String {
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
