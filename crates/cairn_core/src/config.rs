//! Repository configuration and per-invocation options.

use crate::error::{CairnError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Name of the config file inside the repository root.
pub const CONFIG_FILE: &str = "config.toml";

/// Persistent configuration for a cairn repository.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Index persistence settings.
    #[serde(default)]
    pub index: IndexConfig,

    /// Advisory lock settings.
    #[serde(default)]
    pub lock: LockConfig,

    /// Scrub settings.
    #[serde(default)]
    pub scrub: ScrubSettings,

    /// Import settings.
    #[serde(default)]
    pub import: ImportConfig,
}

impl Config {
    /// Load configuration from `<root>/config.toml`, falling back to defaults
    /// when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| CairnError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| CairnError::ConfigError(format!("failed to parse config: {}", e)))
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to `<root>/config.toml`.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| CairnError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| CairnError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }
}

/// Which index backend persists names and metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// `index.txt` + `meta.txt`, replaced by atomic rename.
    #[default]
    Flat,
    /// A redb database at `index.redb`.
    Redb,
}

/// Index persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Storage backend (default: flat).
    pub backend: BackendKind,

    /// Seconds between automatic commits during bulk operations (default: 30).
    pub auto_commit_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Flat,
            auto_commit_secs: 30,
        }
    }
}

impl IndexConfig {
    /// Returns the auto-commit interval as a Duration.
    pub fn auto_commit_interval(&self) -> Duration {
        Duration::from_secs(self.auto_commit_secs)
    }
}

/// Advisory lock settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct LockConfig {
    /// Give up waiting for the lock after this many seconds.
    /// `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl LockConfig {
    /// Returns the lock timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Scrub settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScrubSettings {
    /// Objects larger than this are skipped (bytes).
    pub max_size: Option<u64>,

    /// Append-only error log, relative to the repository root.
    pub error_log: String,
}

impl Default for ScrubSettings {
    fn default() -> Self {
        Self {
            max_size: None,
            error_log: "scrub_errors.txt".to_string(),
        }
    }
}

/// Import settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ImportConfig {
    /// Replace an existing name that maps to a different digest.
    pub overwrite_names: bool,
}

/// Per-invocation switches, carried once on the `Repo` handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Decide and report, but change nothing on disk.
    pub dry_run: bool,

    /// Overwrite existing destinations and names.
    pub force: bool,
}

impl Options {
    /// The dry-run guard. Every filesystem mutation asks this first.
    ///
    /// Returns `true` when the mutation may proceed. In dry-run mode the
    /// intended action is logged instead.
    pub fn allow(&self, action: &str, target: &Path) -> bool {
        if self.dry_run {
            info!(action, target = %target.display(), "dry run, skipping");
            false
        } else {
            true
        }
    }
}
