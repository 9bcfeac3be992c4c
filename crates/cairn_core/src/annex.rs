//! Bridge to a git-annex object store.
//!
//! git-annex stores content under `.git/annex/objects/<xx>/<yy>/<key>/<key>`
//! where `<key>` is `SHA256-s<size>--<digest>` and the two directory levels
//! come from an MD5 of the key. Content is shared by hardlink in both
//! directions, so neither store ever holds a second copy.

use crate::digest::Digest;
use crate::error::{CairnError, Result};
use crate::hash_cache::{self, WriteAccess};
use crate::object_store::{link_error, sibling_temp, ContentStore, LinkOutcome};
use md5::{Digest as _, Md5};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Symbols used for annex hash directories.
const HASH_ALPHABET: &[u8; 32] = b"0123456789zqjxkmvwgpfZQJXKMVWGPF";

/// Marker every annexed symlink target contains.
const OBJECTS_MARKER: &str = ".git/annex/objects/";

/// The annex key for content of `size` bytes with `digest`.
pub fn annex_key(size: u64, digest: &Digest) -> String {
    format!("SHA256-s{}--{}", size, digest)
}

/// Two-level directory for `key`, in git-annex's "mixed case" scheme,
/// e.g. `"Xk/2q/"`.
pub fn hashdir_mixed(key: &str) -> String {
    let hash = Md5::digest(key.as_bytes());
    let word = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]);
    let letter = |x: u32| HASH_ALPHABET[((word >> (6 * x)) & 31) as usize] as char;
    format!("{}{}/{}{}/", letter(1), letter(0), letter(3), letter(2))
}

/// Extracts the SHA-256 digest from an annex key or a path ending in one.
/// Keys with an extension (`SHA256E-...--<digest>.jpg`) are accepted.
pub fn parse_key_digest(target: &str) -> Result<Digest> {
    let key = target.rsplit('/').next().unwrap_or(target);
    if !(key.starts_with("SHA256-") || key.starts_with("SHA256E-")) {
        return Err(CairnError::InvalidAnnexKey(key.to_string()));
    }
    let (_, tail) = key
        .rsplit_once("--")
        .ok_or_else(|| CairnError::InvalidAnnexKey(key.to_string()))?;
    let hex = tail.get(..Digest::HEX_LEN).unwrap_or(tail);
    Digest::from_hex(hex).map_err(|_| CairnError::InvalidAnnexKey(key.to_string()))
}

/// What [`Annex::fix_link`] did with one symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixResult {
    /// The annex object was missing and is now linked from the repository.
    Linked,
    /// The annex object was replaced by the repository object.
    Replaced,
    /// The annex object exists; left alone.
    Present,
    /// The repository does not hold this digest.
    NotInRepository,
    /// Not an annex symlink.
    NotAnnexed,
}

/// What [`Annex::add_file`] did with one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// The file is now a symlink into the annex.
    Added,
    /// The annex already holds the key; the file was left alone.
    AlreadyAnnexed,
    /// The file has no valid cached digest.
    NoCachedDigest,
}

/// A git-annex repository located by its `.git` directory.
#[derive(Debug, Clone)]
pub struct Annex {
    root: PathBuf,
    objects: PathBuf,
}

impl Annex {
    /// Finds the annex enclosing `start` by walking up to a directory that
    /// contains `.git`.
    pub fn find(start: &Path) -> Result<Self> {
        let start = fs::canonicalize(start)?;
        let mut dir = start.as_path();
        loop {
            if dir.join(".git").is_dir() {
                let objects = dir.join(".git").join("annex").join("objects");
                if !objects.is_dir() {
                    return Err(CairnError::AnnexNotFound(start));
                }
                debug!(root = %dir.display(), "found annex");
                return Ok(Self {
                    root: dir.to_path_buf(),
                    objects,
                });
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(CairnError::AnnexNotFound(start)),
            }
        }
    }

    /// Worktree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `.git/annex/objects`.
    pub fn objects(&self) -> &Path {
        &self.objects
    }

    /// Object path for `key`: `<objects>/<hashdir>/<key>/<key>`.
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.objects.join(hashdir_mixed(key)).join(key).join(key)
    }

    /// Makes sure the annex object behind symlink `link` exists, hardlinking
    /// it from `store` when missing. With `force` an existing annex object
    /// is replaced by the repository's copy.
    pub fn fix_link(&self, store: &ContentStore, link: &Path, force: bool) -> Result<FixResult> {
        let target = fs::read_link(link)?;
        let target_str = target.to_string_lossy();
        if !target_str.contains(OBJECTS_MARKER) || !target_str.contains("SHA256") {
            return Ok(FixResult::NotAnnexed);
        }
        let digest = parse_key_digest(&target_str)?;
        if !store.exists(&digest) {
            info!(link = %link.display(), digest = %digest, "not in repository");
            return Ok(FixResult::NotInRepository);
        }

        let object = self.object_for_target(&target);
        let exists = object.symlink_metadata().is_ok();
        if exists && !force {
            debug!(object = %object.display(), "annex object exists, skipping");
            return Ok(FixResult::Present);
        }

        // Annex key directories are usually read-only.
        let parent = object.parent().unwrap_or(&self.objects);
        let _access = if store.options().allow("prepare-annex-dir", parent) {
            fs::create_dir_all(parent)?;
            Some(WriteAccess::grant(parent)?)
        } else {
            None
        };
        let outcome = if exists {
            store.link_overwrite(&digest, &object)?
        } else {
            store.link_to(&digest, &object)?
        };
        Ok(match outcome {
            LinkOutcome::Replaced => FixResult::Replaced,
            LinkOutcome::Linked => FixResult::Linked,
            LinkOutcome::AlreadyPresent | LinkOutcome::DestinationExists => FixResult::Present,
        })
    }

    /// The annex object a symlink target names: its last four components
    /// under `.git/annex/objects`.
    fn object_for_target(&self, target: &Path) -> PathBuf {
        let parts: Vec<&std::ffi::OsStr> = target
            .components()
            .filter_map(|c| match c {
                Component::Normal(p) => Some(p),
                _ => None,
            })
            .collect();
        let tail = &parts[parts.len().saturating_sub(4)..];
        tail.iter().fold(self.objects.clone(), |acc, p| acc.join(p))
    }

    /// Moves a plain file into the annex and leaves a relative symlink in its
    /// place. The file must carry a valid cached digest. The annex object is
    /// created before the file is replaced.
    pub fn add_file(&self, path: &Path, options: crate::config::Options) -> Result<AddResult> {
        let Some(digest) = hash_cache::read_cached_digest(path) else {
            info!(path = %path.display(), "missing hash cache, not adding");
            return Ok(AddResult::NoCachedDigest);
        };
        let size = fs::metadata(path)?.len();
        let key = annex_key(size, &digest);
        let object = self.key_path(&key);
        if object.symlink_metadata().is_ok() {
            return Ok(AddResult::AlreadyAnnexed);
        }

        let abs = fs::canonicalize(path)?;
        let link_dir = abs.parent().unwrap_or(Path::new("/"));
        let relative = relative_path(&object, link_dir);
        if !options.allow("annex-add", path) {
            return Ok(AddResult::Added);
        }

        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::hard_link(&abs, &object).map_err(|e| link_error(e, &abs, &object))?;
        replace_with_symlink(&relative, &abs)?;
        info!(path = %path.display(), key, "added to annex");
        Ok(AddResult::Added)
    }
}

/// Swaps `path` for a symlink to `target` in one rename. On failure `path`
/// is untouched and the staged link is removed.
fn replace_with_symlink(target: &Path, path: &Path) -> Result<()> {
    let staged = sibling_temp(path);
    symlink(target, &staged)?;
    if let Err(e) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(e.into());
    }
    Ok(())
}

/// `target` expressed relative to directory `base`. Both must be absolute.
fn relative_path(target: &Path, base: &Path) -> PathBuf {
    let target: Vec<Component> = target.components().collect();
    let base: Vec<Component> = base.components().collect();
    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for part in &target[common..] {
        out.push(part.as_os_str());
    }
    out
}
