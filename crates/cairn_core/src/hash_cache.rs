//! Digest cache stored in an extended attribute on the file itself.
//!
//! The attribute value is `"<mtime>:<hex digest>"`. A cached digest is only
//! trusted while the file's current mtime (whole seconds) still equals the
//! cached one; any mismatch or parse failure just means "hash it again".

use crate::digest::Digest;
use crate::error::{CairnError, Result};
use std::fs;
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extended attribute holding the cached digest.
pub const XATTR_KEY: &str = "user.repo.sha256";

/// Modification time of a file in whole seconds.
pub fn mtime_of(meta: &fs::Metadata) -> i64 {
    meta.mtime()
}

/// Returns the raw `(mtime, digest)` pair stored on `path`, without comparing
/// it to the file's current mtime.
pub fn cached_entry(path: &Path) -> Option<(i64, Digest)> {
    let raw = match xattr::get(path, XATTR_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot read hash xattr");
            return None;
        }
    };
    parse_entry(&raw)
}

fn parse_entry(raw: &[u8]) -> Option<(i64, Digest)> {
    let text = std::str::from_utf8(raw).ok()?;
    let (mtime, digest) = text.split_once(':')?;
    if digest.len() != Digest::HEX_LEN {
        return None;
    }
    let mtime = mtime.parse::<i64>().ok()?;
    let digest = Digest::from_hex(digest).ok()?;
    Some((mtime, digest))
}

/// Returns the cached digest of `path` if its recorded mtime still matches.
pub fn read_cached_digest(path: &Path) -> Option<Digest> {
    let (mtime, digest) = cached_entry(path)?;
    let current = fs::metadata(path).ok().map(|m| mtime_of(&m))?;
    if current == mtime {
        debug!(path = %path.display(), "hash cache hit");
        Some(digest)
    } else {
        debug!(path = %path.display(), cached = mtime, current, "hash cache stale");
        None
    }
}

/// Stores `digest` and `mtime` on `path`.
///
/// Read-only files get owner write permission for the duration of the call;
/// the original mode is restored afterwards, on error paths too.
pub fn write_cached_digest(path: &Path, digest: &Digest, mtime: i64) -> Result<()> {
    let value = format!("{}:{}", mtime, digest.as_hex());
    let _access = WriteAccess::grant(path)?;
    xattr::set(path, XATTR_KEY, value.as_bytes())?;
    debug!(path = %path.display(), mtime, "stamped hash cache");
    Ok(())
}

/// Stamps the digest using the file's current mtime. Failures are logged,
/// not returned: the cache is an optimisation and filesystems without
/// xattr support must keep working.
pub fn stamp(path: &Path, digest: &Digest) {
    let result = fs::metadata(path)
        .map_err(CairnError::from)
        .and_then(|meta| write_cached_digest(path, digest, mtime_of(&meta)));
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "could not write hash cache");
    }
}

/// Scoped permission elevation: adds owner read/write to a path and puts the
/// original mode back on drop.
pub struct WriteAccess {
    path: PathBuf,
    original: Option<fs::Permissions>,
}

impl WriteAccess {
    /// Grants owner read/write on `path` until the guard is dropped.
    pub fn grant(path: &Path) -> io::Result<Self> {
        let original = fs::metadata(path)?.permissions();
        let mode = original.mode();
        if mode & 0o600 == 0o600 {
            return Ok(Self {
                path: path.to_path_buf(),
                original: None,
            });
        }
        fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o600))?;
        Ok(Self {
            path: path.to_path_buf(),
            original: Some(original),
        })
    }
}

impl Drop for WriteAccess {
    fn drop(&mut self) {
        if let Some(perms) = self.original.take() {
            if let Err(e) = fs::set_permissions(&self.path, perms) {
                warn!(path = %self.path.display(), error = %e, "failed to restore permissions");
            }
        }
    }
}
