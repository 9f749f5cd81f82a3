//! Configuration types for pdbmirror.
//!
//! Configuration is layered: built-in defaults, then an optional TOML file
//! (`<config_dir>/pdbmirror/mirror.toml` or `--config`), then CLI overrides
//! applied by the binary.
//!
//! ```toml
//! on_failure = "continue"
//!
//! [remote]
//! host = "rsync.rcsb.org"
//! port = 33444
//! module_root = "ftp_data/structures/divided"
//!
//! [[datasets]]
//! name = "pdb"
//! remote_path = "pdb"
//! local_dir = "pdb"
//! input_suffix = ".ent.gz"
//! ```

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AppError;
use crate::mirror::FailurePolicy;

/// Default rsync daemon serving the wwPDB archive.
pub const DEFAULT_HOST: &str = "rsync.rcsb.org";

/// The RCSB rsync daemon listens on a non-default port.
pub const DEFAULT_PORT: u16 = 33444;

/// Module path under which the divided structure hierarchy lives.
pub const DEFAULT_MODULE_ROOT: &str = "ftp_data/structures/divided";

const CONFIG_DIR_NAME: &str = "pdbmirror";
const CONFIG_FILE_NAME: &str = "mirror.toml";

/// Commented template written by `pdbmirror init-config`.
///
/// Parsing this template yields exactly [`MirrorConfig::default`].
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# pdbmirror configuration
#
# What to do when a transfer fails:
#   "continue" - run the remaining transfers anyway
#   "abort"    - skip the remaining transfers
on_failure = "continue"

[remote]
host = "rsync.rcsb.org"
port = 33444
module_root = "ftp_data/structures/divided"

# Each dataset is mirrored from <host>::<module_root>/<remote_path>/
# into <dest>/<local_dir>. Local files missing on the server are deleted,
# unless they match one of the `protect` patterns.

[[datasets]]
name = "pdb"
remote_path = "pdb"
local_dir = "pdb"
input_suffix = ".ent.gz"
# protect = ["*.xml", "*.failed"]

[[datasets]]
name = "mmcif"
remote_path = "mmCIF"
local_dir = "mmCIF"
input_suffix = ".cif.gz"

[[datasets]]
name = "xml"
remote_path = "XML"
local_dir = "XML"
input_suffix = ".xml.gz"
"#;

/// Location of the rsync daemon and the module that holds the datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub module_root: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            module_root: DEFAULT_MODULE_ROOT.to_string(),
        }
    }
}

impl RemoteConfig {
    /// Builds the rsync daemon source for a dataset.
    ///
    /// The trailing slash makes rsync copy the directory's contents rather
    /// than the directory itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdbmirror_core::RemoteConfig;
    ///
    /// let remote = RemoteConfig::default();
    /// assert_eq!(
    ///     remote.source_for("mmCIF"),
    ///     "rsync.rcsb.org::ftp_data/structures/divided/mmCIF/"
    /// );
    /// ```
    pub fn source_for(&self, remote_path: &str) -> String {
        let module_root = self.module_root.trim_matches('/');
        let remote_path = remote_path.trim_matches('/');
        if remote_path.is_empty() {
            format!("{}::{}/", self.host, module_root)
        } else {
            format!("{}::{}/{}/", self.host, module_root, remote_path)
        }
    }
}

/// A single remote tree mirrored into a local directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetEntry {
    /// Short name used on the command line (`--dataset pdb`).
    pub name: String,
    /// Path below `module_root` on the server.
    pub remote_path: String,
    /// Directory below the destination root.
    pub local_dir: String,
    /// File name suffix of the structure files in this tree.
    pub input_suffix: String,
    /// Whether the dataset is mirrored when no explicit selection is given.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Local-only files matching these patterns survive `--delete`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protect: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl DatasetEntry {
    fn new(name: &str, remote_path: &str, local_dir: &str, input_suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            remote_path: remote_path.to_string(),
            local_dir: local_dir.to_string(),
            input_suffix: input_suffix.to_string(),
            enabled: true,
            protect: Vec::new(),
        }
    }
}

/// Top-level mirror configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub on_failure: FailurePolicy,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default = "default_datasets")]
    pub datasets: Vec<DatasetEntry>,
}

fn default_datasets() -> Vec<DatasetEntry> {
    vec![
        DatasetEntry::new("pdb", "pdb", "pdb", ".ent.gz"),
        DatasetEntry::new("mmcif", "mmCIF", "mmCIF", ".cif.gz"),
        DatasetEntry::new("xml", "XML", "XML", ".xml.gz"),
    ]
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            on_failure: FailurePolicy::default(),
            remote: RemoteConfig::default(),
            datasets: default_datasets(),
        }
    }
}

impl MirrorConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        let config: MirrorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Looks up a dataset by name, ignoring ASCII case.
    pub fn dataset(&self, name: &str) -> Option<&DatasetEntry> {
        self.datasets
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Checks the invariants the mirror service relies on.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.remote.host.trim().is_empty() {
            return Err(AppError::InvalidConfig("remote.host is empty".to_string()));
        }
        if self.remote.port == 0 {
            return Err(AppError::InvalidConfig("remote.port must be > 0".to_string()));
        }
        if self.remote.module_root.trim_matches('/').is_empty() {
            return Err(AppError::InvalidConfig(
                "remote.module_root is empty".to_string(),
            ));
        }
        if self.datasets.is_empty() {
            return Err(AppError::InvalidConfig("no datasets configured".to_string()));
        }

        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            if dataset.name.trim().is_empty() {
                return Err(AppError::InvalidConfig(
                    "dataset name is empty".to_string(),
                ));
            }
            if !seen.insert(dataset.name.to_ascii_lowercase()) {
                return Err(AppError::InvalidConfig(format!(
                    "duplicate dataset name '{}'",
                    dataset.name
                )));
            }
            if dataset.input_suffix.trim().is_empty() {
                return Err(AppError::InvalidConfig(format!(
                    "dataset '{}' has an empty input_suffix",
                    dataset.name
                )));
            }
            validate_local_dir(&dataset.name, &dataset.local_dir)?;
        }

        Ok(())
    }
}

/// `local_dir` must stay inside the destination root, since `--delete`
/// prunes whatever it points at.
fn validate_local_dir(name: &str, local_dir: &str) -> Result<(), AppError> {
    let path = Path::new(local_dir);
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    let has_normal = path.components().any(|c| matches!(c, Component::Normal(_)));

    if escapes || !has_normal {
        return Err(AppError::InvalidConfig(format!(
            "dataset '{}': local_dir '{}' must be a relative path below the destination",
            name, local_dir
        )));
    }
    Ok(())
}

/// Returns `<config_dir>/pdbmirror/mirror.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Loads the mirror configuration.
///
/// An explicit `path` must exist. Without one, the default location is
/// read when present and the built-in defaults are used otherwise.
pub fn load_mirror_config(path: Option<&Path>) -> Result<MirrorConfig, AppError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(default) if default.is_file() => default,
            _ => {
                debug!("No config file found, using built-in defaults");
                return Ok(MirrorConfig::default());
            }
        },
    };

    let content = fs::read_to_string(&path)?;
    let config = MirrorConfig::from_toml_str(&content)?;
    info!(
        "Loaded {} datasets from {}",
        config.datasets.len(),
        path.display()
    );
    Ok(config)
}

/// Writes [`DEFAULT_CONFIG_TEMPLATE`] to `path`, creating parent directories.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), AppError> {
    if path.exists() && !force {
        return Err(AppError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("{} already exists (use --force to overwrite)", path.display()),
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    Ok(())
}
