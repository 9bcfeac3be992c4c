//! Content-addressed object storage built on hardlinks.
//!
//! Every digest owns exactly one file, `objects/SHA256/<3>/<3>/<rest>.d`.
//! Objects enter the store by hardlink, never by partial write, so a crash
//! can leave at most an empty shard directory behind.

use crate::config::Options;
use crate::digest::{hash_reader, Digest};
use crate::error::{CairnError, Result};
use crate::hash_cache::{self, mtime_of};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;

/// `EXDEV`: hardlink or rename across filesystems. Same value on Linux and the BSDs.
const EXDEV: i32 = 18;

/// Suffix of object data files.
const DATA_SUFFIX: &str = ".d";

/// Suffix of legacy per-object JSON metadata sidecars.
pub(crate) const SIDECAR_SUFFIX: &str = ".m";

/// What a link operation ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new directory entry was created.
    Linked,
    /// The object (or destination) was already there; nothing changed.
    AlreadyPresent,
    /// The destination existed and was left untouched.
    DestinationExists,
    /// An existing destination was atomically replaced.
    Replaced,
}

/// Result of streaming a file into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyIn {
    /// Digest of the content.
    pub digest: Digest,
    /// Bytes read from the source.
    pub size: u64,
    /// False when the content was already stored and the copy was discarded.
    pub stored: bool,
}

/// Content-addressed object storage.
///
/// # Examples
///
/// ```
/// use cairn_core::{ContentStore, Digest, Options};
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let store = ContentStore::new(tmp.path(), Options::default());
///
/// let src = tmp.path().join("hello.txt");
/// std::fs::write(&src, b"hello").unwrap();
/// let digest = Digest::of_bytes(b"hello");
///
/// store.link_in(&src, &digest).unwrap();
/// assert!(store.exists(&digest));
/// assert_eq!(std::fs::read(store.data_path(&digest)).unwrap(), b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct ContentStore {
    objects: PathBuf,
    tmp: PathBuf,
    options: Options,
}

impl ContentStore {
    /// Creates a store rooted at `<repo_root>/objects`, staging through
    /// `<repo_root>/tmp`.
    pub fn new(repo_root: impl AsRef<Path>, options: Options) -> Self {
        let root = repo_root.as_ref();
        Self {
            objects: root.join("objects"),
            tmp: root.join("tmp"),
            options,
        }
    }

    /// Returns the `objects/` directory.
    pub fn root(&self) -> &Path {
        &self.objects
    }

    /// Options every mutation is checked against.
    pub fn options(&self) -> Options {
        self.options
    }

    /// Path of the data file for `digest`.
    pub fn data_path(&self, digest: &Digest) -> PathBuf {
        self.objects.join(format!("{}{}", digest.key(), DATA_SUFFIX))
    }

    /// Checks if an object exists in the store.
    pub fn exists(&self, digest: &Digest) -> bool {
        self.data_path(digest).is_file()
    }

    /// Stores `source` as the object for `digest` by hardlinking it in.
    ///
    /// No-op when the object is already present. The new object gets its hash
    /// cache stamped and is made read-only.
    ///
    /// # Errors
    ///
    /// `CrossDevice` if `source` lives on another filesystem.
    pub fn link_in(&self, source: &Path, digest: &Digest) -> Result<LinkOutcome> {
        if self.exists(digest) {
            return Ok(LinkOutcome::AlreadyPresent);
        }

        let dest = self.data_path(digest);
        if !self.options.allow("store", &dest) {
            return Ok(LinkOutcome::Linked);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        match fs::hard_link(source, &dest) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(LinkOutcome::AlreadyPresent);
            }
            Err(e) => return Err(link_error(e, source, &dest)),
        }

        hash_cache::stamp(&dest, digest);
        make_read_only(&dest)?;
        debug!(object = %dest.display(), source = %source.display(), "stored object");
        Ok(LinkOutcome::Linked)
    }

    /// Streams `source` into a private temp file inside the store's
    /// filesystem, hashing as it goes, then links the temp file in.
    ///
    /// The temp file is discarded either way; when the digest was already
    /// stored nothing else happens. `name` is only used for logging.
    pub fn copy_in(&self, source: &Path, name: &str) -> Result<CopyIn> {
        let src_meta = fs::metadata(source)?;
        let reader = File::open(source)?;

        if !self.options.allow("copy", &self.tmp) {
            let (digest, size) = hash_reader(reader, None)?;
            return Ok(CopyIn {
                digest,
                size,
                stored: !self.exists(&digest),
            });
        }

        fs::create_dir_all(&self.tmp)?;
        let mut staged = NamedTempFile::new_in(&self.tmp)?;
        let (digest, size) = hash_reader(reader, Some(&mut staged))?;

        if self.exists(&digest) {
            debug!(name, digest = %digest, "content already stored, discarding copy");
            return Ok(CopyIn {
                digest,
                size,
                stored: false,
            });
        }

        staged.as_file().sync_all()?;
        filetime::set_file_mtime(
            staged.path(),
            FileTime::from_last_modification_time(&src_meta),
        )?;
        let stored = self.link_in(staged.path(), &digest)? == LinkOutcome::Linked;
        info!(name, digest = %digest, size, "copied into store");

        Ok(CopyIn {
            digest,
            size,
            stored,
        })
    }

    /// Materializes an object at `dest` by hardlink. An existing `dest` is
    /// left alone.
    pub fn link_to(&self, digest: &Digest, dest: &Path) -> Result<LinkOutcome> {
        let object = self.require(digest)?;
        if dest.symlink_metadata().is_ok() {
            debug!(dest = %dest.display(), "destination exists, not linking");
            return Ok(LinkOutcome::DestinationExists);
        }
        if !self.options.allow("link", dest) {
            return Ok(LinkOutcome::Linked);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::hard_link(&object, dest).map_err(|e| link_error(e, &object, dest))?;
        Ok(LinkOutcome::Linked)
    }

    /// Replaces `dest` with a hardlink to the object.
    ///
    /// A fresh link is made beside `dest` and renamed over it, so `dest` never
    /// disappears in between.
    pub fn link_overwrite(&self, digest: &Digest, dest: &Path) -> Result<LinkOutcome> {
        let object = self.require(digest)?;
        let existed = match fs::metadata(dest) {
            Ok(meta) => {
                if same_inode(&meta, &fs::metadata(&object)?) {
                    return Ok(LinkOutcome::AlreadyPresent);
                }
                true
            }
            Err(_) => false,
        };
        if !self.options.allow("link-overwrite", dest) {
            return Ok(LinkOutcome::Replaced);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let staged = sibling_temp(dest);
        fs::hard_link(&object, &staged).map_err(|e| link_error(e, &object, &staged))?;
        if let Err(e) = fs::rename(&staged, dest) {
            let _ = fs::remove_file(&staged);
            return Err(e.into());
        }

        Ok(if existed {
            LinkOutcome::Replaced
        } else {
            LinkOutcome::Linked
        })
    }

    /// Materializes an object at `dest` by copying, for destinations on
    /// another filesystem. Writes beside `dest` and renames into place.
    pub fn copy_to(&self, digest: &Digest, dest: &Path, overwrite: bool) -> Result<LinkOutcome> {
        let object = self.require(digest)?;
        let existed = dest.symlink_metadata().is_ok();
        if existed && !overwrite {
            return Ok(LinkOutcome::DestinationExists);
        }
        if !self.options.allow("copy-out", dest) {
            return Ok(LinkOutcome::Linked);
        }

        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let mut staged = NamedTempFile::new_in(parent)?;
        io::copy(&mut File::open(&object)?, &mut staged)?;
        staged.flush()?;
        let mtime = FileTime::from_last_modification_time(&fs::metadata(&object)?);
        filetime::set_file_mtime(staged.path(), mtime)?;
        staged.persist(dest).map_err(|e| CairnError::Io(e.error))?;

        Ok(if existed {
            LinkOutcome::Replaced
        } else {
            LinkOutcome::Linked
        })
    }

    /// Size and whole-second mtime of a stored object.
    pub fn stat(&self, digest: &Digest) -> Result<(u64, i64)> {
        let meta = fs::metadata(self.require(digest)?)?;
        Ok((meta.len(), mtime_of(&meta)))
    }

    /// Removes the object for `digest`. Used when reclaiming orphans.
    pub fn remove(&self, digest: &Digest) -> Result<bool> {
        let path = self.data_path(digest);
        if !path.exists() {
            return Ok(false);
        }
        if !self.options.allow("remove", &path) {
            return Ok(true);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }

    /// Lists every digest that has a data file, sorted.
    pub fn list_digests(&self) -> Result<Vec<Digest>> {
        let mut digests: Vec<Digest> = self
            .walk_suffix(DATA_SUFFIX)?
            .into_iter()
            .map(|(digest, _)| digest)
            .collect();
        digests.sort();
        Ok(digests)
    }

    /// Lists legacy JSON sidecar files with the digest they belong to.
    pub(crate) fn list_sidecars(&self) -> Result<Vec<(Digest, PathBuf)>> {
        self.walk_suffix(SIDECAR_SUFFIX)
    }

    fn walk_suffix(&self, suffix: &str) -> Result<Vec<(Digest, PathBuf)>> {
        let base = self.objects.join("SHA256");
        let mut found = Vec::new();
        if !base.exists() {
            return Ok(found);
        }

        for entry in WalkDir::new(&base)
            .min_depth(3)
            .max_depth(3)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| CairnError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(digest) = digest_from_path(&base, path, suffix) else {
                continue;
            };
            found.push((digest, path.to_path_buf()));
        }

        Ok(found)
    }

    fn require(&self, digest: &Digest) -> Result<PathBuf> {
        let path = self.data_path(digest);
        if path.is_file() {
            Ok(path)
        } else {
            Err(CairnError::ObjectNotFound(digest.as_hex()))
        }
    }
}

/// Reassembles a digest from `<base>/<3>/<3>/<rest><suffix>`.
fn digest_from_path(base: &Path, path: &Path, suffix: &str) -> Option<Digest> {
    let rel = path.strip_prefix(base).ok()?;
    let mut hex = String::with_capacity(Digest::HEX_LEN);
    for part in rel.iter() {
        hex.push_str(part.to_str()?);
    }
    let hex = hex.strip_suffix(suffix)?;
    Digest::from_hex(hex).ok()
}

/// True when both metadata describe the same inode.
pub fn same_inode(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    a.dev() == b.dev() && a.ino() == b.ino()
}

/// True when two paths are hardlinks of one file.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => same_inode(&ma, &mb),
        _ => false,
    }
}

fn make_read_only(path: &Path) -> io::Result<()> {
    let mode = fs::metadata(path)?.permissions().mode();
    fs::set_permissions(path, fs::Permissions::from_mode(mode & !0o222))
}

pub(crate) fn sibling_temp(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

pub(crate) fn link_error(e: io::Error, from: &Path, to: &Path) -> CairnError {
    if e.raw_os_error() == Some(EXDEV) {
        CairnError::CrossDevice {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        }
    } else {
        CairnError::Io(e)
    }
}
