//! Mirror service layer.
//!
//! This module holds the planning and bookkeeping logic for a mirror run,
//! decoupled from how a transfer is actually executed. The rsync process
//! lives behind [`TransferRunner`] so the sequencing and failure policy can
//! be exercised without a network.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{DatasetEntry, MirrorConfig};
use crate::error::AppError;
use crate::fingerprint::{fingerprint_tree, TreeFingerprint};

/// What to do with the remaining transfers after one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Run every transfer regardless of earlier failures.
    #[default]
    Continue,
    /// Skip all transfers after the first failure.
    Abort,
}

/// Outcome of mirroring a single dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Destination was empty before and holds files now
    Created,
    /// Destination changed
    Updated,
    /// Destination fingerprint is identical before and after
    Unchanged,
    /// rsync failed or could not be started
    Failed,
    /// Not attempted because an earlier transfer failed under `Abort`
    Skipped,
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransferOutcome::Created => "created",
            TransferOutcome::Updated => "updated",
            TransferOutcome::Unchanged => "unchanged",
            TransferOutcome::Failed => "failed",
            TransferOutcome::Skipped => "skipped",
        };
        f.pad(label)
    }
}

/// Classifies a successful transfer by comparing fingerprints.
pub fn classify_transfer(before: &TreeFingerprint, after: &TreeFingerprint) -> TransferOutcome {
    if before.is_empty() && !after.is_empty() {
        TransferOutcome::Created
    } else if before.digest == after.digest {
        TransferOutcome::Unchanged
    } else {
        TransferOutcome::Updated
    }
}

/// One planned rsync transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// Dataset name from the config.
    pub dataset: String,
    /// rsync daemon source, always ending in `/`.
    pub source: String,
    /// Local directory that becomes the mirror.
    pub destination: PathBuf,
    /// Daemon port.
    pub port: u16,
    /// Patterns exempted from `--delete`.
    pub protect: Vec<String>,
}

impl TransferJob {
    pub fn from_dataset(config: &MirrorConfig, dataset: &DatasetEntry, dest_root: &Path) -> Self {
        Self {
            dataset: dataset.name.clone(),
            source: config.remote.source_for(&dataset.remote_path),
            destination: dest_root.join(&dataset.local_dir),
            port: config.remote.port,
            protect: dataset.protect.clone(),
        }
    }
}

/// Exit status of a finished transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStatus {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
}

impl TransferStatus {
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    pub fn exited(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn signalled() -> Self {
        Self { code: None }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes a single transfer to completion.
///
/// Implementations block (asynchronously) until the transfer has finished.
/// An `Err` means the transfer could not be started at all.
pub trait TransferRunner {
    fn run(
        &self,
        job: &TransferJob,
    ) -> impl Future<Output = Result<TransferStatus, AppError>> + Send;
}

/// Selects the datasets to mirror and turns them into jobs.
///
/// An empty `selection` means every enabled dataset. Named datasets are
/// matched case-insensitively and may be disabled in the config. Jobs
/// always follow config order.
pub fn plan_transfers(
    config: &MirrorConfig,
    dest_root: &Path,
    selection: &[String],
) -> Result<Vec<TransferJob>, AppError> {
    for name in selection {
        if config.dataset(name).is_none() {
            return Err(AppError::UnknownDataset(name.clone()));
        }
    }

    let jobs: Vec<TransferJob> = config
        .datasets
        .iter()
        .filter(|d| {
            if selection.is_empty() {
                d.enabled
            } else {
                selection.iter().any(|s| d.name.eq_ignore_ascii_case(s))
            }
        })
        .map(|d| TransferJob::from_dataset(config, d, dest_root))
        .collect();

    if jobs.is_empty() {
        return Err(AppError::InvalidConfig(
            "no datasets selected for mirroring".to_string(),
        ));
    }
    Ok(jobs)
}

/// Result of mirroring a single dataset.
#[derive(Debug, Clone)]
pub struct DatasetMirrorResult {
    pub dataset: String,
    pub destination: PathBuf,
    pub outcome: TransferOutcome,
    /// Fingerprint after a successful transfer.
    pub fingerprint: Option<TreeFingerprint>,
    /// Error message if the transfer failed.
    pub error: Option<String>,
}

impl DatasetMirrorResult {
    pub fn success(job: &TransferJob, outcome: TransferOutcome, fingerprint: TreeFingerprint) -> Self {
        Self {
            dataset: job.dataset.clone(),
            destination: job.destination.clone(),
            outcome,
            fingerprint: Some(fingerprint),
            error: None,
        }
    }

    pub fn failure(job: &TransferJob, error: String) -> Self {
        Self {
            dataset: job.dataset.clone(),
            destination: job.destination.clone(),
            outcome: TransferOutcome::Failed,
            fingerprint: None,
            error: Some(error),
        }
    }

    pub fn skipped(job: &TransferJob) -> Self {
        Self {
            dataset: job.dataset.clone(),
            destination: job.destination.clone(),
            outcome: TransferOutcome::Skipped,
            fingerprint: None,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(
            self.outcome,
            TransferOutcome::Failed | TransferOutcome::Skipped
        )
    }
}

/// Aggregated results of one mirror run.
#[derive(Debug, Clone, Default)]
pub struct MirrorRunSummary {
    pub results: Vec<DatasetMirrorResult>,
}

impl MirrorRunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: DatasetMirrorResult) {
        self.results.push(result);
    }

    pub fn count(&self, outcome: TransferOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn successful_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.count(TransferOutcome::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(TransferOutcome::Skipped)
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// True when every planned transfer ran and succeeded.
    pub fn is_complete(&self) -> bool {
        self.successful_count() == self.total()
    }
}

/// Runs transfer jobs one after another.
pub struct MirrorService<R> {
    runner: R,
    policy: FailurePolicy,
}

impl<R: TransferRunner> MirrorService<R> {
    pub fn new(runner: R, policy: FailurePolicy) -> Self {
        Self { runner, policy }
    }

    /// Mirrors every job in order and returns the per-dataset results.
    ///
    /// Individual transfer failures are recorded in the summary rather than
    /// returned as errors. Under [`FailurePolicy::Abort`] the jobs after the
    /// first failure are recorded as skipped.
    pub async fn run(&self, jobs: &[TransferJob]) -> MirrorRunSummary {
        let total = jobs.len();
        let mut summary = MirrorRunSummary::new();

        for (i, job) in jobs.iter().enumerate() {
            info!(
                "[{}/{}] Mirroring {} -> {}",
                i + 1,
                total,
                job.source,
                job.destination.display()
            );

            let result = match self.mirror_one(job).await {
                Ok(result) => {
                    info!("[{}/{}] {}: {}", i + 1, total, job.dataset, result.outcome);
                    result
                }
                Err(e) => {
                    error!("[{}/{}] {}: {}", i + 1, total, job.dataset, e);
                    DatasetMirrorResult::failure(job, e.to_string())
                }
            };

            let failed = !result.is_success();
            summary.add(result);

            if failed && self.policy == FailurePolicy::Abort {
                let remaining = &jobs[i + 1..];
                if !remaining.is_empty() {
                    warn!(
                        "Aborting after failed transfer; skipping {} remaining dataset(s)",
                        remaining.len()
                    );
                }
                for skipped in remaining {
                    summary.add(DatasetMirrorResult::skipped(skipped));
                }
                break;
            }
        }

        summary
    }

    async fn mirror_one(&self, job: &TransferJob) -> Result<DatasetMirrorResult, AppError> {
        let destination = job.destination.clone();
        let before = blocking(move || {
            std::fs::create_dir_all(&destination)?;
            fingerprint_tree(&destination)
        })
        .await?;
        debug!(
            "{}: {} files ({} bytes) before transfer",
            job.dataset, before.files, before.bytes
        );

        let status = self.runner.run(job).await?;
        if !status.is_success() {
            return Err(AppError::TransferFailed {
                dataset: job.dataset.clone(),
                code: status.code,
            });
        }

        let destination = job.destination.clone();
        let after = blocking(move || fingerprint_tree(&destination)).await?;
        debug!(
            "{}: {} files ({} bytes) after transfer",
            job.dataset, after.files, after.bytes
        );

        let outcome = classify_transfer(&before, &after);
        Ok(DatasetMirrorResult::success(job, outcome, after))
    }
}

/// Runs directory creation and tree walks on the blocking thread pool.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records every job and applies a scripted effect per dataset.
    #[derive(Default)]
    struct FakeRunner {
        calls: Mutex<Vec<String>>,
        exit_codes: HashMap<String, i32>,
        writes: HashMap<String, Vec<(&'static str, &'static [u8])>>,
        deletes: HashMap<String, Vec<&'static str>>,
    }

    impl FakeRunner {
        fn failing(mut self, dataset: &str, code: i32) -> Self {
            self.exit_codes.insert(dataset.to_string(), code);
            self
        }

        fn writing(mut self, dataset: &str, file: &'static str, data: &'static [u8]) -> Self {
            self.writes
                .entry(dataset.to_string())
                .or_default()
                .push((file, data));
            self
        }

        fn deleting(mut self, dataset: &str, file: &'static str) -> Self {
            self.deletes.entry(dataset.to_string()).or_default().push(file);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TransferRunner for FakeRunner {
        async fn run(&self, job: &TransferJob) -> Result<TransferStatus, AppError> {
            self.calls.lock().unwrap().push(job.dataset.clone());

            if let Some(code) = self.exit_codes.get(&job.dataset) {
                return Ok(TransferStatus::exited(*code));
            }
            for (file, data) in self.writes.get(&job.dataset).into_iter().flatten() {
                fs::write(job.destination.join(file), data)?;
            }
            for file in self.deletes.get(&job.dataset).into_iter().flatten() {
                fs::remove_file(job.destination.join(file))?;
            }
            Ok(TransferStatus::success())
        }
    }

    fn default_jobs(root: &Path) -> Vec<TransferJob> {
        plan_transfers(&MirrorConfig::default(), root, &[]).unwrap()
    }

    #[test]
    fn test_classify_transfer() {
        let empty = TreeFingerprint::empty();
        let full = TreeFingerprint {
            files: 1,
            bytes: 4,
            digest: "abc".to_string(),
        };
        let changed = TreeFingerprint {
            files: 2,
            bytes: 8,
            digest: "def".to_string(),
        };

        assert_eq!(classify_transfer(&empty, &full), TransferOutcome::Created);
        assert_eq!(classify_transfer(&empty, &empty), TransferOutcome::Unchanged);
        assert_eq!(classify_transfer(&full, &full), TransferOutcome::Unchanged);
        assert_eq!(classify_transfer(&full, &changed), TransferOutcome::Updated);
        assert_eq!(classify_transfer(&full, &empty), TransferOutcome::Updated);
    }

    #[test]
    fn test_plan_default_order_and_paths() {
        let jobs = default_jobs(Path::new("/data"));
        let summary: Vec<_> = jobs
            .iter()
            .map(|j| (j.dataset.as_str(), j.source.as_str(), j.destination.clone()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (
                    "pdb",
                    "rsync.rcsb.org::ftp_data/structures/divided/pdb/",
                    PathBuf::from("/data/pdb")
                ),
                (
                    "mmcif",
                    "rsync.rcsb.org::ftp_data/structures/divided/mmCIF/",
                    PathBuf::from("/data/mmCIF")
                ),
                (
                    "xml",
                    "rsync.rcsb.org::ftp_data/structures/divided/XML/",
                    PathBuf::from("/data/XML")
                ),
            ]
        );
        assert!(jobs.iter().all(|j| j.port == 33444));
    }

    #[test]
    fn test_plan_selection_keeps_config_order() {
        let selection = vec!["XML".to_string(), "pdb".to_string()];
        let jobs = plan_transfers(&MirrorConfig::default(), Path::new("."), &selection).unwrap();
        let names: Vec<_> = jobs.iter().map(|j| j.dataset.as_str()).collect();
        assert_eq!(names, vec!["pdb", "xml"]);
    }

    #[test]
    fn test_plan_unknown_dataset() {
        let selection = vec!["cath".to_string()];
        let err = plan_transfers(&MirrorConfig::default(), Path::new("."), &selection).unwrap_err();
        assert!(matches!(err, AppError::UnknownDataset(name) if name == "cath"));
    }

    #[test]
    fn test_plan_skips_disabled_unless_selected() {
        let mut config = MirrorConfig::default();
        config.datasets[2].enabled = false;

        let jobs = plan_transfers(&config, Path::new("."), &[]).unwrap();
        assert_eq!(jobs.len(), 2);

        let jobs = plan_transfers(&config, Path::new("."), &["xml".to_string()]).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].dataset, "xml");
    }

    #[test]
    fn test_plan_nothing_enabled() {
        let mut config = MirrorConfig::default();
        for dataset in &mut config.datasets {
            dataset.enabled = false;
        }
        let err = plan_transfers(&config, Path::new("."), &[]).unwrap_err();
        assert!(matches!(err, AppError::InvalidConfig(_)));
    }

    #[test]
    fn test_plan_carries_protect_patterns() {
        let mut config = MirrorConfig::default();
        config.datasets[0].protect = vec!["*.xml".to_string()];
        let jobs = plan_transfers(&config, Path::new("."), &[]).unwrap();
        assert_eq!(jobs[0].protect, vec!["*.xml"]);
        assert!(jobs[1].protect.is_empty());
    }

    #[tokio::test]
    async fn test_run_creates_destinations() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::default()
            .writing("pdb", "pdb1abc.ent.gz", b"atoms")
            .writing("mmcif", "1abc.cif.gz", b"atoms")
            .writing("xml", "1abc.xml.gz", b"atoms");
        let service = MirrorService::new(runner, FailurePolicy::Continue);

        let summary = service.run(&default_jobs(dir.path())).await;

        assert!(summary.is_complete());
        assert_eq!(summary.count(TransferOutcome::Created), 3);
        for local in ["pdb", "mmCIF", "XML"] {
            assert!(dir.path().join(local).is_dir());
        }
    }

    #[tokio::test]
    async fn test_second_run_is_unchanged() {
        let dir = tempdir().unwrap();
        let jobs = default_jobs(dir.path());

        let first = MirrorService::new(
            FakeRunner::default().writing("pdb", "pdb1abc.ent.gz", b"atoms"),
            FailurePolicy::Continue,
        );
        let summary = first.run(&jobs).await;
        assert_eq!(summary.results[0].outcome, TransferOutcome::Created);

        let second = MirrorService::new(FakeRunner::default(), FailurePolicy::Continue);
        let summary = second.run(&jobs).await;
        assert_eq!(summary.count(TransferOutcome::Unchanged), 3);
    }

    #[tokio::test]
    async fn test_deletion_is_reported_as_update() {
        let dir = tempdir().unwrap();
        let pdb_dir = dir.path().join("pdb");
        fs::create_dir_all(&pdb_dir).unwrap();
        fs::write(pdb_dir.join("pdb1abc.ent.gz"), b"atoms").unwrap();
        fs::write(pdb_dir.join("pdbobsolete.ent.gz"), b"atoms").unwrap();

        let runner = FakeRunner::default().deleting("pdb", "pdbobsolete.ent.gz");
        let service = MirrorService::new(runner, FailurePolicy::Continue);
        let jobs = plan_transfers(&MirrorConfig::default(), dir.path(), &["pdb".to_string()]).unwrap();

        let summary = service.run(&jobs).await;
        assert_eq!(summary.results[0].outcome, TransferOutcome::Updated);
        assert!(!pdb_dir.join("pdbobsolete.ent.gz").exists());
        assert_eq!(summary.results[0].fingerprint.as_ref().unwrap().files, 1);
    }

    #[tokio::test]
    async fn test_continue_policy_runs_remaining_transfers() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::default().failing("mmcif", 10);
        let service = MirrorService::new(runner, FailurePolicy::Continue);

        let summary = service.run(&default_jobs(dir.path())).await;

        assert_eq!(service.runner.calls(), vec!["pdb", "mmcif", "xml"]);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.skipped_count(), 0);
        assert!(!summary.is_complete());

        let failed = &summary.results[1];
        assert_eq!(failed.outcome, TransferOutcome::Failed);
        assert!(failed.error.as_deref().unwrap().contains("code 10"));
    }

    #[tokio::test]
    async fn test_abort_policy_skips_remaining_transfers() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::default().failing("pdb", 35);
        let service = MirrorService::new(runner, FailurePolicy::Abort);

        let summary = service.run(&default_jobs(dir.path())).await;

        assert_eq!(service.runner.calls(), vec!["pdb"]);
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.skipped_count(), 2);
        assert_eq!(summary.successful_count(), 0);
    }

    #[tokio::test]
    async fn test_abort_on_last_transfer_skips_nothing() {
        let dir = tempdir().unwrap();
        let runner = FakeRunner::default().failing("xml", 23);
        let service = MirrorService::new(runner, FailurePolicy::Abort);

        let summary = service.run(&default_jobs(dir.path())).await;
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.successful_count(), 2);
        assert_eq!(summary.skipped_count(), 0);
    }

    #[tokio::test]
    async fn test_uncreatable_destination_fails_without_running() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        fs::write(&root, b"file").unwrap();

        let service = MirrorService::new(FakeRunner::default(), FailurePolicy::Continue);
        let summary = service.run(&default_jobs(&root)).await;

        assert!(service.runner.calls().is_empty());
        assert_eq!(summary.failed_count(), 3);
        assert!(summary.results[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("I/O error"));
    }

    #[test]
    fn test_summary_empty() {
        let summary = MirrorRunSummary::new();
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.failed_count(), 0);
        assert!(summary.is_complete());
    }

    #[test]
    fn test_transfer_status() {
        assert!(TransferStatus::success().is_success());
        assert!(!TransferStatus::exited(23).is_success());
        assert!(!TransferStatus::signalled().is_success());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(TransferOutcome::Unchanged.to_string(), "unchanged");
        assert_eq!(TransferOutcome::Skipped.to_string(), "skipped");
    }
}
