//! pdbmirror Core - Domain types, error handling, configuration and the mirror service.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod inventory;
pub mod mirror;

pub use config::{
    default_config_path, load_mirror_config, write_default_config, DatasetEntry, MirrorConfig,
    RemoteConfig,
};
pub use error::AppError;
pub use fingerprint::{fingerprint_tree, TreeFingerprint};
pub use inventory::{scan_all, scan_dataset, DatasetInventory};
pub use mirror::{
    classify_transfer, plan_transfers, DatasetMirrorResult, FailurePolicy, MirrorRunSummary,
    MirrorService, TransferJob, TransferOutcome, TransferRunner, TransferStatus,
};
