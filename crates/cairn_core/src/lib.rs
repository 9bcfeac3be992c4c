//! Cairn Core Library
//!
//! A content-addressed file repository:
//! - Files are stored once per SHA-256 digest, by hardlink
//! - Every logical name that ever pointed at a digest is remembered
//! - Named files can be re-materialized from the store on demand
//! - A digest cache in an extended attribute avoids rehashing unchanged files
//!
//! # Quick Start
//!
//! ```
//! use cairn_core::Repo;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let root = tmp.path().join("repo");
//! let mut repo = Repo::init(&root).unwrap();
//!
//! let photo = tmp.path().join("photo.jpg");
//! std::fs::write(&photo, b"jpeg bytes").unwrap();
//!
//! let report = repo.import(&[&photo], "", None).unwrap();
//! assert_eq!(report.stored, 1);
//! repo.commit().unwrap();
//!
//! let reopened = Repo::open(&root).unwrap();
//! assert_eq!(reopened.index().names().len(), 1);
//! ```
//!
//! # Layout
//!
//! ```text
//! <root>/objects/SHA256/<3>/<3>/<rest>.d   object content
//! <root>/index.txt                         "<name> <digest>" per line
//! <root>/meta.txt                          "<digest> <size> <mtime>" per line
//! <root>/lock                              advisory lock
//! <root>/tmp/                              staging for cross-filesystem copies
//! <root>/scrub_errors.txt                  append-only scrub findings
//! ```

mod annex;
mod backend;
mod config;
mod digest;
mod error;
mod gc;
mod hash_cache;
mod index;
mod lock;
mod object_store;
mod repair;
mod repo;
mod scrub;
mod tree;
mod walk;

pub use annex::{annex_key, hashdir_mixed, parse_key_digest, AddResult, Annex, FixResult};
pub use backend::{
    FlatFileBackend, IndexBackend, IndexSnapshot, LegacySidecar, MetaEntry, RedbBackend,
    INDEX_FILE, META_FILE, REDB_FILE,
};
pub use config::{
    BackendKind, Config, ImportConfig, IndexConfig, LockConfig, Options, ScrubSettings,
    CONFIG_FILE,
};
pub use digest::{hash_file, hash_reader, Digest, BLOCK_SIZE};
pub use error::{CairnError, Result};
pub use gc::{clean_missing, gc, CleanReport, GcProgressCallback, GcReport};
pub use hash_cache::{
    cached_entry, mtime_of, read_cached_digest, write_cached_digest, WriteAccess, XATTR_KEY,
};
pub use index::{AddOutcome, Index};
pub use lock::{LockGuard, LockMode, RepoLock, LOCK_FILE};
pub use object_store::{same_file, ContentStore, CopyIn, LinkOutcome};
pub use repair::{fix_paths, fix_times, reindex, FixPathsReport, FixTimesReport, ReindexReport};
pub use repo::{
    AnnexReport, FileStatus, ImportReport, ItemCallback, MaterializeReport, Repo,
};
pub use scrub::{
    scrub, ScrubOptions, ScrubProgressCallback, ScrubReport, ScrubStatus, SkipReason,
};
pub use tree::{MoveOutcome, NameTree, NodeId};
pub use walk::{clean_name, name_for, walk_files};

/// Time provider trait for testing.
///
/// Allows injecting controlled time into auto-commit and scrub logging.
/// Defaults to the system clock unless set via `with_time_provider()`.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}
