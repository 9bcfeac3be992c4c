//! Index persistence backends.
//!
//! Every backend stores the same two maps, names to digests and digests to
//! metadata, and must replace them as one unit. The flat-file backend is the
//! reference; the redb backend keeps the same contract inside one write
//! transaction.

use crate::digest::Digest;
use crate::error::{CairnError, Result};
use redb::{Database, ReadableTable, TableDefinition, TableError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name to digest map file.
pub const INDEX_FILE: &str = "index.txt";

/// Digest to metadata map file.
pub const META_FILE: &str = "meta.txt";

/// redb database file.
pub const REDB_FILE: &str = "index.redb";

/// Size and earliest-seen modification time of one digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetaEntry {
    /// Size in bytes.
    pub size: u64,
    /// Modification time, unix seconds.
    pub mtime: i64,
}

/// Full contents of an index, as loaded or about to be saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    /// Logical name to digest.
    pub names: BTreeMap<String, Digest>,
    /// Digest to metadata.
    pub meta: BTreeMap<Digest, MetaEntry>,
}

/// Storage for an [`IndexSnapshot`].
pub trait IndexBackend: Send + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Reads the whole index. A never-saved index loads empty.
    fn load(&self) -> Result<IndexSnapshot>;

    /// Replaces the whole index. Readers must observe either the previous or
    /// the new snapshot, never a mix.
    fn save(&self, snapshot: &IndexSnapshot) -> Result<()>;
}

/// `index.txt` + `meta.txt`, each replaced by write-temp-then-rename.
#[derive(Debug, Clone)]
pub struct FlatFileBackend {
    root: PathBuf,
}

impl FlatFileBackend {
    /// Backend for the repository at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    fn load_names(&self) -> Result<BTreeMap<String, Digest>> {
        let path = self.index_path();
        let mut names = BTreeMap::new();
        if let Some(content) = read_optional(&path)? {
            for (n, line) in content.lines().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let (name, digest) =
                    parse_name_line(line).map_err(|reason| bad_line(&path, n + 1, reason))?;
                names.insert(name.to_string(), digest);
            }
        }
        Ok(names)
    }

    fn load_meta(&self) -> Result<BTreeMap<Digest, MetaEntry>> {
        let path = self.meta_path();
        let mut meta = BTreeMap::new();
        if let Some(content) = read_optional(&path)? {
            for (n, line) in content.lines().enumerate() {
                if line.is_empty() {
                    continue;
                }
                let (digest, entry) =
                    parse_meta_line(line).map_err(|reason| bad_line(&path, n + 1, reason))?;
                meta.insert(digest, entry);
            }
        }
        Ok(meta)
    }

    /// File replacements that turn the stored index into `snapshot`, in the
    /// order they must land.
    ///
    /// After any prefix of the sequence every stored name still has
    /// metadata. Metadata goes before names; when metadata is being dropped,
    /// the union of old and new goes first and the exact set last.
    fn plan_save(&self, snapshot: &IndexSnapshot) -> Result<Vec<(PathBuf, String)>> {
        for name in snapshot.names.keys() {
            check_name(name)?;
        }

        let on_disk = self.load_meta()?;
        let drops_meta = on_disk.keys().any(|d| !snapshot.meta.contains_key(d));

        let mut writes = Vec::with_capacity(3);
        if drops_meta {
            let mut union = on_disk;
            union.extend(snapshot.meta.iter().map(|(d, e)| (*d, *e)));
            writes.push((self.meta_path(), render_meta(&union)));
        } else {
            writes.push((self.meta_path(), render_meta(&snapshot.meta)));
        }
        writes.push((self.index_path(), render_names(&snapshot.names)));
        if drops_meta {
            writes.push((self.meta_path(), render_meta(&snapshot.meta)));
        }
        Ok(writes)
    }
}

impl IndexBackend for FlatFileBackend {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn load(&self) -> Result<IndexSnapshot> {
        let snapshot = IndexSnapshot {
            names: self.load_names()?,
            meta: self.load_meta()?,
        };
        debug!(
            names = snapshot.names.len(),
            digests = snapshot.meta.len(),
            "loaded flat index"
        );
        Ok(snapshot)
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        for (path, content) in self.plan_save(snapshot)? {
            write_atomic(&path, &content)?;
        }
        sync_dir(&self.root);
        Ok(())
    }
}

fn render_names(names: &BTreeMap<String, Digest>) -> String {
    let mut out = String::new();
    for (name, digest) in names {
        out.push_str(&format!("{} {}\n", name, digest));
    }
    out
}

fn render_meta(meta: &BTreeMap<Digest, MetaEntry>) -> String {
    let mut out = String::new();
    for (digest, entry) in meta {
        out.push_str(&format!("{} {} {}\n", digest, entry.size, entry.mtime));
    }
    out
}

/// Rejects names that cannot survive a round trip through `index.txt`.
pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CairnError::InvalidName(name.to_string(), "empty name"));
    }
    if name.contains(['\n', '\r']) {
        return Err(CairnError::InvalidName(name.to_string(), "line break in name"));
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Names may contain spaces, so the digest is split off the right.
fn parse_name_line(line: &str) -> std::result::Result<(&str, Digest), String> {
    let (name, digest) = line
        .rsplit_once(' ')
        .ok_or_else(|| "missing digest".to_string())?;
    if name.is_empty() {
        return Err("empty name".to_string());
    }
    let digest = Digest::from_hex(digest).map_err(|e| e.to_string())?;
    Ok((name, digest))
}

fn parse_meta_line(line: &str) -> std::result::Result<(Digest, MetaEntry), String> {
    let mut parts = line.split(' ');
    let (Some(digest), Some(size), Some(mtime), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err("expected '<digest> <size> <mtime>'".to_string());
    };
    let digest = Digest::from_hex(digest).map_err(|e| e.to_string())?;
    let size = size.parse().map_err(|_| format!("bad size {:?}", size))?;
    let mtime = mtime.parse().map_err(|_| format!("bad mtime {:?}", mtime))?;
    Ok((digest, MetaEntry { size, mtime }))
}

fn bad_line(path: &Path, line: usize, reason: String) -> CairnError {
    CairnError::InvalidIndexLine {
        path: path.to_path_buf(),
        line,
        reason,
    }
}

/// Writes `path` through `<path>.tmp`: fill, fsync, rename.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn sync_dir(dir: &Path) {
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
}

const NAMES_TABLE: TableDefinition<&str, &[u8; 32]> = TableDefinition::new("names");
const META_TABLE: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("meta");

/// The index inside a redb database. Both tables are replaced in one write
/// transaction.
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedbBackend").field("path", &self.path).finish()
    }
}

impl RedbBackend {
    /// Opens (or creates) `<root>/index.redb`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let path = root.as_ref().join(REDB_FILE);
        let db = Database::create(&path).map_err(backend_err("failed to open index database"))?;
        Ok(Self { db, path })
    }
}

fn backend_err<E: fmt::Display>(context: &'static str) -> impl Fn(E) -> CairnError {
    move |e| CairnError::Backend(format!("{}: {}", context, e))
}

fn encode_meta(entry: &MetaEntry) -> [u8; 16] {
    let mut buf = [0u8; 16];
    buf[..8].copy_from_slice(&entry.size.to_le_bytes());
    buf[8..].copy_from_slice(&entry.mtime.to_le_bytes());
    buf
}

fn decode_meta(raw: &[u8]) -> Option<MetaEntry> {
    if raw.len() != 16 {
        return None;
    }
    let mut size = [0u8; 8];
    let mut mtime = [0u8; 8];
    size.copy_from_slice(&raw[..8]);
    mtime.copy_from_slice(&raw[8..]);
    Some(MetaEntry {
        size: u64::from_le_bytes(size),
        mtime: i64::from_le_bytes(mtime),
    })
}

impl IndexBackend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn load(&self) -> Result<IndexSnapshot> {
        let mut snapshot = IndexSnapshot::default();
        let txn = self
            .db
            .begin_read()
            .map_err(backend_err("failed to begin read transaction"))?;

        match txn.open_table(NAMES_TABLE) {
            Ok(table) => {
                for entry in table.iter().map_err(backend_err("failed to iterate names"))? {
                    let (name, digest) = entry.map_err(backend_err("failed to read name"))?;
                    snapshot
                        .names
                        .insert(name.value().to_string(), Digest::from_bytes(*digest.value()));
                }
            }
            Err(TableError::TableDoesNotExist(_)) => {}
            Err(e) => return Err(backend_err("failed to open names table")(e)),
        }

        match txn.open_table(META_TABLE) {
            Ok(table) => {
                for entry in table.iter().map_err(backend_err("failed to iterate meta"))? {
                    let (digest, raw) = entry.map_err(backend_err("failed to read meta"))?;
                    let digest = Digest::from_bytes(*digest.value());
                    let meta = decode_meta(raw.value()).ok_or_else(|| {
                        CairnError::Backend(format!("corrupt meta record for {}", digest))
                    })?;
                    snapshot.meta.insert(digest, meta);
                }
            }
            Err(TableError::TableDoesNotExist(_)) => {}
            Err(e) => return Err(backend_err("failed to open meta table")(e)),
        }

        debug!(
            names = snapshot.names.len(),
            digests = snapshot.meta.len(),
            "loaded redb index"
        );
        Ok(snapshot)
    }

    fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let txn = self
            .db
            .begin_write()
            .map_err(backend_err("failed to begin write transaction"))?;

        txn.delete_table(NAMES_TABLE)
            .map_err(backend_err("failed to clear names"))?;
        txn.delete_table(META_TABLE)
            .map_err(backend_err("failed to clear meta"))?;
        {
            let mut meta = txn
                .open_table(META_TABLE)
                .map_err(backend_err("failed to open meta table"))?;
            for (digest, entry) in &snapshot.meta {
                meta.insert(digest.as_bytes(), encode_meta(entry).as_slice())
                    .map_err(backend_err("failed to write meta"))?;
            }

            let mut names = txn
                .open_table(NAMES_TABLE)
                .map_err(backend_err("failed to open names table"))?;
            for (name, digest) in &snapshot.names {
                names
                    .insert(name.as_str(), digest.as_bytes())
                    .map_err(backend_err("failed to write name"))?;
            }
        }

        txn.commit().map_err(backend_err("failed to commit index"))?;
        Ok(())
    }
}

/// Legacy per-object metadata sidecar, `<object>.m`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LegacySidecar {
    /// Every name ever imported for the object.
    #[serde(default)]
    pub names: Vec<String>,
    /// Object size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Earliest mtime seen.
    #[serde(default)]
    pub mtime: Option<i64>,
    /// Format version.
    #[serde(default)]
    pub version: u32,
}

impl LegacySidecar {
    /// Reads and parses a sidecar file.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            CairnError::Backend(format!("bad sidecar {}: {}", path.display(), e))
        })
    }
}
