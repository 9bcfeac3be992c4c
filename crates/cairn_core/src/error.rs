//! Error types for cairn_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cairn_core operations.
#[derive(Error, Debug)]
pub enum CairnError {
    /// The given directory does not hold a cairn repository.
    #[error("not a cairn repository: {}", .0.display())]
    NotARepository(PathBuf),

    /// `init` found an existing index.
    #[error("repository already initialized at {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// No object is stored for the digest.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// No index entry for the logical name.
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// Invalid hex string for Digest parsing.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// A line of an index file could not be parsed.
    #[error("invalid index line {line} in {}: {reason}", path.display())]
    InvalidIndexLine {
        /// File containing the bad line
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// A logical name the index cannot store.
    #[error("invalid name {0:?}: {1}")]
    InvalidName(String, &'static str),

    /// A name is already mapped to another digest and overwrite was not requested.
    #[error("name {name} already maps to {existing}, refusing to map it to {requested}")]
    NameConflict {
        /// The logical name
        name: String,
        /// Digest currently mapped
        existing: String,
        /// Digest that was rejected
        requested: String,
    },

    /// Hardlinks cannot cross filesystems.
    #[error("cannot hardlink {} to {}: different filesystems", from.display(), to.display())]
    CrossDevice {
        /// Link source
        from: PathBuf,
        /// Link destination
        to: PathBuf,
    },

    /// The repository lock could not be acquired within the configured timeout.
    #[error("timed out after {waited_ms}ms waiting for {mode} lock on {}", path.display())]
    LockTimeout {
        /// Lock file path
        path: PathBuf,
        /// "shared" or "exclusive"
        mode: &'static str,
        /// How long we waited
        waited_ms: u64,
    },

    /// Index backend (redb, sidecar JSON) failure.
    #[error("index backend error: {0}")]
    Backend(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// No git-annex object directory above the given path.
    #[error("no git-annex repository found above {}", .0.display())]
    AnnexNotFound(PathBuf),

    /// A symlink target that does not look like a SHA256 annex key.
    #[error("invalid annex key: {0}")]
    InvalidAnnexKey(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CairnError {
    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotARepository(_) => Some("Pass --repo <dir> or run 'cairn init' first."),
            Self::AlreadyInitialized(_) => {
                Some("The repository exists already; use it directly or pick another directory.")
            }
            Self::ObjectNotFound(_) => {
                Some("The object store may be damaged. Run 'cairn scrub' and 'cairn clean-missing'.")
            }
            Self::NameConflict { .. } => Some("Re-run with --force to overwrite the existing name."),
            Self::CrossDevice { .. } => {
                Some("Use 'cairn copy' to import or 'cairn pull' to materialize across filesystems.")
            }
            Self::LockTimeout { .. } => {
                Some("Another cairn process holds the repository lock. Wait for it or raise [lock] timeout_secs.")
            }
            Self::InvalidName(..) => Some("Names must be non-empty and free of line breaks; try 'cairn fix-paths'."),
            Self::InvalidIndexLine { .. } => {
                Some("The index file is damaged. Restore it from backup or run 'cairn reindex'.")
            }
            _ => None,
        }
    }
}

/// Convenience Result type for cairn_core operations.
pub type Result<T> = std::result::Result<T, CairnError>;
