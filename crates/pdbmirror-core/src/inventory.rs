//! Inventory of local mirror directories.
//!
//! Benchmark runs write their artifacts next to the mirrored inputs:
//! `pdb1abc.ent.gz` gets a `pdb1abc.ent.xml` summary or a
//! `pdb1abc.ent.failed` marker, and reference trees get
//! `1abc.xml.parsed.xml`. Inputs and results are matched by stem, the
//! file name without its final extension. A failure marker does not settle
//! an input: it is parsed again on the next run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::{DatasetEntry, MirrorConfig};
use crate::error::AppError;

const RESULT_SUFFIX: &str = ".xml";
const PARSED_RESULT_SUFFIX: &str = ".parsed.xml";
const FAILED_SUFFIX: &str = ".failed";
const COMPRESSED_SUFFIX: &str = ".gz";

/// File counts for one dataset directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetInventory {
    pub dataset: String,
    pub path: PathBuf,
    pub exists: bool,
    /// Files ending with the dataset's input suffix.
    pub inputs: usize,
    /// Total size of the inputs in bytes.
    pub bytes: u64,
    /// Uncompressed `.xml` summaries.
    pub results: usize,
    /// `.failed` markers.
    pub failed_markers: usize,
    /// Inputs without a summary, including those with only a failure marker.
    pub pending: usize,
}

/// Strips the final extension from a file name.
///
/// # Examples
///
/// ```
/// use pdbmirror_core::inventory::file_stem;
///
/// assert_eq!(file_stem("pdb1abc.ent.gz"), "pdb1abc.ent");
/// assert_eq!(file_stem("README"), "README");
/// ```
pub fn file_stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Stem of the input a result belongs to, or `None` if `name` is not a
/// result.
fn result_stem(name: &str) -> Option<&str> {
    if let Some(stem) = name.strip_suffix(PARSED_RESULT_SUFFIX) {
        return Some(stem);
    }
    if name.ends_with(RESULT_SUFFIX) {
        return Some(file_stem(name));
    }
    None
}

/// Scans a single dataset directory below `dest_root`.
pub fn scan_dataset(dataset: &DatasetEntry, dest_root: &Path) -> Result<DatasetInventory, AppError> {
    let path = dest_root.join(&dataset.local_dir);
    let mut inventory = DatasetInventory {
        dataset: dataset.name.clone(),
        path: path.clone(),
        ..Default::default()
    };

    if !path.is_dir() {
        return Ok(inventory);
    }
    inventory.exists = true;

    let mut input_stems = Vec::new();
    let mut done_stems = HashSet::new();

    for entry in WalkDir::new(&path).follow_links(false) {
        let entry = entry.map_err(|e| AppError::Io(e.into()))?;
        if entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();

        if name.ends_with(&dataset.input_suffix) {
            inventory.inputs += 1;
            inventory.bytes += entry.metadata().map_err(|e| AppError::Io(e.into()))?.len();
            input_stems.push(file_stem(&name).to_string());
            continue;
        }

        if name.ends_with(COMPRESSED_SUFFIX) {
            continue;
        }
        if let Some(stem) = result_stem(&name) {
            inventory.results += 1;
            done_stems.insert(stem.to_string());
        } else if name.ends_with(FAILED_SUFFIX) {
            inventory.failed_markers += 1;
        }
    }

    inventory.pending = input_stems
        .iter()
        .filter(|stem| !done_stems.contains(stem.as_str()))
        .count();

    Ok(inventory)
}

/// Scans every configured dataset, in config order.
pub fn scan_all(config: &MirrorConfig, dest_root: &Path) -> Result<Vec<DatasetInventory>, AppError> {
    config
        .datasets
        .iter()
        .map(|dataset| scan_dataset(dataset, dest_root))
        .collect()
}
