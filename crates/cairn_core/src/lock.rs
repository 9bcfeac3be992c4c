//! Advisory repository lock.
//!
//! One lock file, `<root>/lock`, taken shared for read traversal and
//! exclusive around every commit. The lock only coordinates processes that
//! use this crate; it does not stop arbitrary writers.

use crate::error::{CairnError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name of the lock file inside the repository root.
pub const LOCK_FILE: &str = "lock";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Any number of readers.
    Shared,
    /// A single committer.
    Exclusive,
}

impl LockMode {
    fn as_str(self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

/// Handle on a repository's lock file.
#[derive(Debug, Clone)]
pub struct RepoLock {
    path: PathBuf,
    timeout: Option<Duration>,
}

impl RepoLock {
    /// Creates a handle for `<root>/lock`. `timeout` of `None` blocks until
    /// the lock is available.
    pub fn new(root: &Path, timeout: Option<Duration>) -> Self {
        Self {
            path: root.join(LOCK_FILE),
            timeout,
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Takes the lock in shared mode.
    pub fn shared(&self) -> Result<LockGuard> {
        self.acquire(LockMode::Shared)
    }

    /// Takes the lock in exclusive mode.
    pub fn exclusive(&self) -> Result<LockGuard> {
        self.acquire(LockMode::Exclusive)
    }

    fn acquire(&self, mode: LockMode) -> Result<LockGuard> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        match self.timeout {
            None => {
                match mode {
                    LockMode::Shared => FileExt::lock_shared(&file)?,
                    LockMode::Exclusive => FileExt::lock_exclusive(&file)?,
                }
            }
            Some(timeout) => self.poll(&file, mode, timeout)?,
        }

        debug!(path = %self.path.display(), mode = mode.as_str(), "lock acquired");
        Ok(LockGuard {
            file: Some(file),
            mode,
        })
    }

    fn poll(&self, file: &File, mode: LockMode, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            let attempt = match mode {
                LockMode::Shared => FileExt::try_lock_shared(file),
                LockMode::Exclusive => FileExt::try_lock_exclusive(file),
            };
            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(e.into()),
            }

            let waited = start.elapsed();
            if waited >= timeout {
                return Err(CairnError::LockTimeout {
                    path: self.path.clone(),
                    mode: mode.as_str(),
                    waited_ms: waited.as_millis() as u64,
                });
            }
            thread::sleep(POLL_INTERVAL.min(timeout - waited));
        }
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// RAII guard for the repository lock.
///
/// The lock is released when dropped. The lock file itself stays in place.
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    mode: LockMode,
}

impl LockGuard {
    /// Mode the lock is held in.
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!(error = %e, "failed to release repository lock");
            }
        }
    }
}
