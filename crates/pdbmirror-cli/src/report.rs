//! Plain-text rendering of run summaries, inventories and dataset lists.

use std::fmt::Write;

use pdbmirror_core::{DatasetInventory, MirrorConfig, MirrorRunSummary, TransferOutcome};

/// Renders the per-dataset outcome table printed after a mirror run.
pub fn render_summary(summary: &MirrorRunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Mirror summary:");
    for result in &summary.results {
        let detail = match (&result.fingerprint, &result.error) {
            (Some(fp), _) => format!("{} files, {}", fp.files, format_bytes(fp.bytes)),
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        };
        let _ = writeln!(
            out,
            "  {:<8} {:<10} {}",
            result.dataset, result.outcome, detail
        );
    }
    let _ = write!(
        out,
        "{} ok ({} created, {} updated, {} unchanged), {} failed, {} skipped",
        summary.successful_count(),
        summary.count(TransferOutcome::Created),
        summary.count(TransferOutcome::Updated),
        summary.count(TransferOutcome::Unchanged),
        summary.failed_count(),
        summary.skipped_count()
    );
    out
}

/// Renders the `status` table.
pub fn render_inventory(inventories: &[DatasetInventory]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<8} {:>9} {:>10} {:>9} {:>7} {:>9}  PATH",
        "DATASET", "INPUTS", "SIZE", "RESULTS", "FAILED", "PENDING"
    );
    for inv in inventories {
        if inv.exists {
            let _ = writeln!(
                out,
                "{:<8} {:>9} {:>10} {:>9} {:>7} {:>9}  {}",
                inv.dataset,
                inv.inputs,
                format_bytes(inv.bytes),
                inv.results,
                inv.failed_markers,
                inv.pending,
                inv.path.display()
            );
        } else {
            let _ = writeln!(
                out,
                "{:<8} {:>9}  {} (not mirrored yet)",
                inv.dataset,
                "-",
                inv.path.display()
            );
        }
    }
    out
}

/// Renders the `datasets` listing.
pub fn render_datasets(config: &MirrorConfig) -> String {
    let mut out = String::new();
    for dataset in &config.datasets {
        let state = if dataset.enabled { "" } else { " (disabled)" };
        let _ = writeln!(
            out,
            "{:<8} {} -> {}{}",
            dataset.name,
            config.remote.source_for(&dataset.remote_path),
            dataset.local_dir,
            state
        );
        if !dataset.protect.is_empty() {
            let _ = writeln!(out, "         protect: {}", dataset.protect.join(", "));
        }
    }
    let _ = write!(out, "port {}, on failure: {:?}", config.remote.port, config.on_failure);
    out
}

/// Formats a byte count with binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdbmirror_core::{DatasetMirrorResult, TransferJob, TreeFingerprint};
    use std::path::PathBuf;

    fn job(name: &str) -> TransferJob {
        TransferJob {
            dataset: name.to_string(),
            source: format!("rsync.rcsb.org::ftp_data/structures/divided/{}/", name),
            destination: PathBuf::from(name),
            port: 33444,
            protect: Vec::new(),
        }
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GiB");
    }

    #[test]
    fn test_render_summary() {
        let mut summary = MirrorRunSummary::new();
        summary.add(DatasetMirrorResult::success(
            &job("pdb"),
            TransferOutcome::Updated,
            TreeFingerprint {
                files: 12,
                bytes: 2048,
                digest: "00".to_string(),
            },
        ));
        summary.add(DatasetMirrorResult::failure(
            &job("mmcif"),
            "rsync exited with code 10".to_string(),
        ));
        summary.add(DatasetMirrorResult::skipped(&job("xml")));

        let text = render_summary(&summary);
        assert!(text.contains("pdb      updated    12 files, 2.0 KiB"));
        assert!(text.contains("mmcif    failed     rsync exited with code 10"));
        assert!(text.contains("xml      skipped"));
        assert!(text.ends_with("1 ok (0 created, 1 updated, 0 unchanged), 1 failed, 1 skipped"));
    }

    #[test]
    fn test_render_inventory() {
        let inventories = vec![
            DatasetInventory {
                dataset: "pdb".to_string(),
                path: PathBuf::from("./pdb"),
                exists: true,
                inputs: 3,
                bytes: 9,
                results: 1,
                failed_markers: 1,
                pending: 1,
            },
            DatasetInventory {
                dataset: "xml".to_string(),
                path: PathBuf::from("./XML"),
                ..Default::default()
            },
        ];

        let text = render_inventory(&inventories);
        assert!(text.starts_with("DATASET"));
        assert!(text.contains("9 B"));
        assert!(text.contains("./XML (not mirrored yet)"));
    }

    #[test]
    fn test_render_datasets() {
        let mut config = MirrorConfig::default();
        config.datasets[2].enabled = false;
        config.datasets[0].protect = vec!["*.xml".to_string()];

        let text = render_datasets(&config);
        assert!(text.contains("pdb      rsync.rcsb.org::ftp_data/structures/divided/pdb/ -> pdb\n"));
        assert!(text.contains("protect: *.xml"));
        assert!(text.contains("-> XML (disabled)"));
        assert!(text.ends_with("port 33444, on failure: Continue"));
    }
}
