//! Repository handle providing the main cairn API.

use crate::annex::{AddResult, Annex, FixResult};
use crate::backend::{
    check_name, FlatFileBackend, IndexBackend, IndexSnapshot, RedbBackend, INDEX_FILE, REDB_FILE,
};
use crate::config::{BackendKind, Config, Options};
use crate::digest::{hash_file, Digest};
use crate::error::{CairnError, Result};
use crate::gc::{CleanReport, GcProgressCallback, GcReport};
use crate::hash_cache::{self, mtime_of, read_cached_digest};
use crate::index::{AddOutcome, Index};
use crate::lock::RepoLock;
use crate::object_store::{same_file, ContentStore, LinkOutcome};
use crate::repair::{FixPathsReport, FixTimesReport, ReindexReport};
use crate::scrub::{ScrubOptions, ScrubProgressCallback, ScrubReport};
use crate::tree::{MoveOutcome, NameTree};
use crate::walk::{clean_name, name_for, walk_files};
use crate::{SystemClock, TimeProvider};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::DirEntry;

/// Per-item progress callback for bulk walks.
/// Called with (items done, logical name).
pub type ItemCallback<'a> = dyn Fn(usize, &str) + 'a;

/// Report from [`Repo::import`] and [`Repo::copy`].
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Regular files visited.
    pub files: usize,
    /// Files whose content entered the store.
    pub stored: usize,
    /// Files whose content was already stored.
    pub deduplicated: usize,
    /// Sources replaced by a hardlink to the existing object.
    pub relinked: usize,
    /// Sources that already were the stored object.
    pub unchanged: usize,
    /// Files that had to be hashed (no usable cache).
    pub hashed: usize,
    /// Names added or overwritten.
    pub names_added: usize,
    /// Entries that are not regular files.
    pub skipped: usize,
    /// Names left alone because they map to other content.
    pub conflicts: Vec<String>,
    /// Per-file failures. The walk continued past each.
    pub errors: Vec<(PathBuf, String)>,
}

/// Report from [`Repo::link`] and [`Repo::pull`].
#[derive(Debug, Default)]
pub struct MaterializeReport {
    /// Destinations created.
    pub created: usize,
    /// Existing destinations replaced (`--force`).
    pub replaced: usize,
    /// Destinations left untouched.
    pub existing: usize,
    /// Per-name failures.
    pub errors: Vec<(String, String)>,
}

/// How a working file relates to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Content not stored.
    New,
    /// Its name maps to its content.
    Tracked,
    /// Its name maps to different content.
    Modified {
        /// Digest the name maps to
        recorded: Digest,
    },
    /// Content stored under other names.
    KnownAs(Vec<String>),
    /// Content stored but unnamed.
    Stored,
    /// The file could not be hashed.
    Unreadable(String),
}

/// Report from [`Repo::annex_fix`] and [`Repo::annex_add`].
#[derive(Debug, Default)]
pub struct AnnexReport {
    /// Annex objects created from the repository.
    pub linked: usize,
    /// Annex objects replaced (`--force`).
    pub replaced: usize,
    /// Annex objects already present.
    pub present: usize,
    /// Keys whose digest the repository does not hold.
    pub not_in_repository: usize,
    /// Files converted to annex symlinks.
    pub added: usize,
    /// Files whose key the annex already holds.
    pub already_annexed: usize,
    /// Entries ignored: not annex links, or no cached digest.
    pub skipped: usize,
    /// Per-file failures.
    pub errors: Vec<(PathBuf, String)>,
}

/// cairn repository handle.
///
/// Owns the loaded index and the content store. Mutations change the index
/// in memory; [`Repo::commit`] persists them.
pub struct Repo {
    root: PathBuf,
    config: Config,
    options: Options,
    store: ContentStore,
    index: Index,
    clock: Arc<dyn TimeProvider>,
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("index", &self.index)
            .finish()
    }
}

fn open_backend(root: &Path, kind: BackendKind) -> Result<Box<dyn IndexBackend>> {
    Ok(match kind {
        BackendKind::Flat => Box::new(FlatFileBackend::new(root)),
        BackendKind::Redb => Box::new(RedbBackend::open(root)?),
    })
}

impl Repo {
    /// Initializes a repository with the default configuration.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` if an index already exists at `path`.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        Self::init_with_config(path, Config::default())
    }

    /// Initializes a repository, writing `config` as its `config.toml`.
    pub fn init_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if root.join(INDEX_FILE).exists() || root.join(REDB_FILE).exists() {
            return Err(CairnError::AlreadyInitialized(root));
        }

        fs::create_dir_all(root.join("objects"))?;
        fs::create_dir_all(root.join("tmp"))?;
        config.save(&root)?;

        {
            let backend = open_backend(&root, config.index.backend)?;
            let lock = RepoLock::new(&root, config.lock.timeout());
            let _guard = lock.exclusive()?;
            backend.save(&IndexSnapshot::default())?;
        }
        info!(root = %root.display(), backend = ?config.index.backend, "initialized repository");

        Self::open(root)
    }

    /// Opens an existing repository and loads its index.
    ///
    /// # Errors
    ///
    /// `NotARepository` if `path` has no object directory or no index.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cairn_core::Repo;
    ///
    /// let repo = Repo::open("/srv/archive").unwrap();
    /// println!("{} names", repo.index().names().len());
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        if !root.join("objects").is_dir() {
            return Err(CairnError::NotARepository(root));
        }
        let config = Config::load(&root)?;
        let marker = match config.index.backend {
            BackendKind::Flat => INDEX_FILE,
            BackendKind::Redb => REDB_FILE,
        };
        if !root.join(marker).exists() {
            return Err(CairnError::NotARepository(root));
        }

        let backend = open_backend(&root, config.index.backend)?;
        let lock = RepoLock::new(&root, config.lock.timeout());
        let index = Index::load(backend, lock)?.with_auto_commit(config.index.auto_commit_interval());
        debug!(root = %root.display(), ?index, "opened repository");

        Ok(Self {
            store: ContentStore::new(&root, Options::default()),
            root,
            config,
            options: Options::default(),
            index,
            clock: Arc::new(SystemClock),
        })
    }

    /// Sets the dry-run/force switches for every following operation.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self.store = ContentStore::new(&self.root, options);
        self.index = self.index.with_options(options);
        self
    }

    /// Sets a custom time provider for testing.
    ///
    /// Drives auto-commit and scrub log timestamps.
    pub fn with_time_provider<T: TimeProvider + 'static>(mut self, provider: T) -> Self {
        let clock: Arc<dyn TimeProvider> = Arc::new(provider);
        self.index = self.index.with_clock(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// Repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current switches.
    pub fn options(&self) -> Options {
        self.options
    }

    /// The content store.
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// The loaded index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Mutable access for callers staging their own index edits.
    pub fn index_mut(&mut self) -> &mut Index {
        &mut self.index
    }

    /// Persists pending index changes. Returns whether anything was written.
    pub fn commit(&mut self) -> Result<bool> {
        self.index.commit()
    }

    /// Imports files on the repository's filesystem by hardlink.
    ///
    /// Each file is named `<prefix>/<path relative to the argument's parent>`.
    /// A file whose content is already stored under another inode is replaced
    /// by a hardlink to the object. Per-file failures are logged and
    /// recorded; the index is auto-committed during the walk and committed
    /// at the end.
    pub fn import<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        prefix: &str,
        progress: Option<&ItemCallback<'_>>,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for (entry, name) in named_entries(paths, prefix, &mut report.errors) {
            if !entry.file_type().is_file() {
                debug!(path = %entry.path().display(), "skip non-file");
                report.skipped += 1;
                continue;
            }
            report.files += 1;
            if let Some(cb) = progress {
                cb(report.files, &name);
            }
            if let Err(e) = self.import_one(entry.path(), &name, &mut report) {
                warn!(path = %entry.path().display(), error = %e, "import failed");
                report.errors.push((entry.path().to_path_buf(), e.to_string()));
            }
            self.index.auto_commit()?;
        }
        self.index.commit()?;
        info!(
            files = report.files,
            stored = report.stored,
            deduplicated = report.deduplicated,
            "import finished"
        );
        Ok(report)
    }

    fn import_one(&mut self, path: &Path, name: &str, report: &mut ImportReport) -> Result<()> {
        check_name(name)?;
        let meta = fs::metadata(path)?;
        let (digest, hashed) = self.identify(path, name, meta.len())?;
        if hashed {
            report.hashed += 1;
        }
        if self.refuse_conflict(name, &digest, report) {
            return Ok(());
        }

        if self.store.exists(&digest) {
            report.deduplicated += 1;
            match self.store.link_overwrite(&digest, path)? {
                LinkOutcome::AlreadyPresent => {
                    debug!(path = %path.display(), "skip existing");
                    report.unchanged += 1;
                }
                _ => {
                    info!(path = %path.display(), digest = %digest, "linked over duplicate");
                    report.relinked += 1;
                }
            }
            let object = self.store.data_path(&digest);
            if hashed && self.options.allow("stamp-cache", &object) {
                hash_cache::stamp(&object, &digest);
            }
        } else {
            info!(path = %path.display(), digest = %digest, "import");
            self.store.link_in(path, &digest)?;
            report.stored += 1;
        }

        self.record(digest, name, meta.len(), mtime_of(&meta), report);
        Ok(())
    }

    /// Digest of `path`, and whether it had to be computed.
    fn identify(&self, path: &Path, name: &str, size: u64) -> Result<(Digest, bool)> {
        if let Some(digest) = read_cached_digest(path) {
            return Ok((digest, false));
        }
        if let Some(digest) = self.index.find_by_name_and_size(name, size) {
            if same_file(path, &self.store.data_path(&digest)) {
                return Ok((digest, false));
            }
        }
        debug!(path = %path.display(), "computing digest");
        Ok((hash_file(path)?, true))
    }

    fn overwrite_names(&self) -> bool {
        self.options.force || self.config.import.overwrite_names
    }

    /// True (and reported) when `name` already maps to another digest and
    /// overwriting is off. Nothing may be stored or linked in that case.
    fn refuse_conflict(&self, name: &str, digest: &Digest, report: &mut ImportReport) -> bool {
        match self.index.get(name) {
            Some(existing) if existing != *digest && !self.overwrite_names() => {
                warn!(name, existing = %existing, requested = %digest, "name conflict, file skipped");
                report.conflicts.push(name.to_string());
                true
            }
            _ => false,
        }
    }

    fn record(&mut self, digest: Digest, name: &str, size: u64, mtime: i64, report: &mut ImportReport) {
        self.index.add_meta(digest, size, mtime);
        match self.index.add_name(digest, name, self.overwrite_names()) {
            AddOutcome::Added | AddOutcome::Replaced { .. } => report.names_added += 1,
            AddOutcome::Unchanged => {}
            AddOutcome::Conflict { .. } => report.conflicts.push(name.to_string()),
            // Names are checked before anything is stored.
            AddOutcome::Rejected => {}
        }
    }

    /// Imports files from another filesystem by streaming them into the
    /// store. Sources are not modified apart from their hash cache.
    pub fn copy<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        prefix: &str,
        progress: Option<&ItemCallback<'_>>,
    ) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for (entry, name) in named_entries(paths, prefix, &mut report.errors) {
            if !entry.file_type().is_file() {
                report.skipped += 1;
                continue;
            }
            report.files += 1;
            if let Some(cb) = progress {
                cb(report.files, &name);
            }
            if let Err(e) = self.copy_one(entry.path(), &name, &mut report) {
                warn!(path = %entry.path().display(), error = %e, "copy failed");
                report.errors.push((entry.path().to_path_buf(), e.to_string()));
            }
            self.index.auto_commit()?;
        }
        self.index.commit()?;
        info!(files = report.files, stored = report.stored, "copy finished");
        Ok(report)
    }

    fn copy_one(&mut self, path: &Path, name: &str, report: &mut ImportReport) -> Result<()> {
        check_name(name)?;
        let meta = fs::metadata(path)?;
        let mut known = read_cached_digest(path);

        // A taken name needs the digest before anything is copied in.
        if self.index.get(name).is_some() && !self.overwrite_names() {
            let digest = match known {
                Some(digest) => digest,
                None => {
                    let digest = hash_file(path)?;
                    report.hashed += 1;
                    if self.options.allow("stamp-cache", path) {
                        hash_cache::stamp(path, &digest);
                    }
                    digest
                }
            };
            if self.refuse_conflict(name, &digest, report) {
                return Ok(());
            }
            known = Some(digest);
        }

        let cached = known.filter(|d| self.store.exists(d));

        let (digest, stored) = match cached {
            Some(digest) => (digest, false),
            None => {
                let copied = self.store.copy_in(path, name)?;
                report.hashed += 1;
                if self.options.allow("stamp-cache", path) {
                    hash_cache::stamp(path, &copied.digest);
                }
                (copied.digest, copied.stored)
            }
        };
        if stored {
            report.stored += 1;
        } else {
            report.deduplicated += 1;
        }

        self.record(digest, name, meta.len(), mtime_of(&meta), report);
        Ok(())
    }

    /// Hardlinks every name under `prefix` into `dest`.
    ///
    /// Existing destinations are left alone unless `force` is set, in which
    /// case they are replaced atomically.
    pub fn link(&self, dest: &Path, prefix: &str, progress: Option<&ItemCallback<'_>>) -> Result<MaterializeReport> {
        self.materialize(dest, prefix, false, progress)
    }

    /// Like [`Repo::link`], but copies, for destinations on another
    /// filesystem.
    pub fn pull(&self, dest: &Path, prefix: &str, progress: Option<&ItemCallback<'_>>) -> Result<MaterializeReport> {
        self.materialize(dest, prefix, true, progress)
    }

    fn materialize(
        &self,
        dest: &Path,
        prefix: &str,
        copy: bool,
        progress: Option<&ItemCallback<'_>>,
    ) -> Result<MaterializeReport> {
        let prefix = clean_name(prefix);
        let force = self.options.force;
        let mut report = MaterializeReport::default();

        let selected = self
            .index
            .list_names(&prefix)
            .filter_map(|(name, digest)| relative_to(name, &prefix).map(|rel| (name, rel, digest)));
        for (i, (name, rel, digest)) in selected.enumerate() {
            if let Some(cb) = progress {
                cb(i + 1, name);
            }
            let target = dest.join(rel);
            let outcome = if copy {
                self.store.copy_to(&digest, &target, force)
            } else if force {
                self.store.link_overwrite(&digest, &target)
            } else {
                self.store.link_to(&digest, &target)
            };
            match outcome {
                Ok(LinkOutcome::Linked) => report.created += 1,
                Ok(LinkOutcome::Replaced) => report.replaced += 1,
                Ok(LinkOutcome::AlreadyPresent | LinkOutcome::DestinationExists) => report.existing += 1,
                Err(e) => {
                    warn!(name, target = %target.display(), error = %e, "materialize failed");
                    report.errors.push((name.to_string(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Classifies working files against the index. Nothing is written, not
    /// even the hash cache.
    pub fn status<P: AsRef<Path>>(&self, paths: &[P], prefix: &str) -> Vec<(PathBuf, FileStatus)> {
        let mut errors = Vec::new();
        let mut out: Vec<(PathBuf, FileStatus)> = named_entries(paths, prefix, &mut errors)
            .into_iter()
            .filter(|(entry, _)| entry.file_type().is_file())
            .map(|(entry, name)| {
                let status = self.status_of(entry.path(), &name);
                (entry.into_path(), status)
            })
            .collect();
        out.extend(
            errors
                .into_iter()
                .map(|(path, e)| (path, FileStatus::Unreadable(e))),
        );
        out
    }

    fn status_of(&self, path: &Path, name: &str) -> FileStatus {
        let digest = match read_cached_digest(path).map(Ok).unwrap_or_else(|| hash_file(path)) {
            Ok(d) => d,
            Err(e) => return FileStatus::Unreadable(e.to_string()),
        };
        match self.index.get(name) {
            Some(recorded) if recorded == digest => return FileStatus::Tracked,
            Some(recorded) => return FileStatus::Modified { recorded },
            None => {}
        }
        let names = self.index.names_for(&digest);
        if !names.is_empty() {
            FileStatus::KnownAs(names.into_iter().map(str::to_string).collect())
        } else if self.store.exists(&digest) {
            FileStatus::Stored
        } else {
            FileStatus::New
        }
    }

    /// Removes every name of the content each given name maps to. Objects
    /// stay until [`Repo::gc`].
    pub fn delete<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut digests = Vec::new();
        for name in names {
            match self.index.get(name.as_ref()) {
                Some(digest) => digests.push(digest),
                None => warn!(name = name.as_ref(), "no such name"),
            }
        }
        let removed = self.index.remove_by_digest(&digests);
        info!(digests = digests.len(), names = removed, "deleted");
        removed
    }

    /// Removes just the given names.
    pub fn delete_names<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let removed = self.index.remove_names(names);
        if removed < names.len() {
            warn!(requested = names.len(), removed, "some names did not exist");
        }
        removed
    }

    /// Renames a name, or a whole directory of names, to `to`.
    ///
    /// Moving onto a name with the same content drops the moved name; moving
    /// onto different content is logged and nothing changes.
    ///
    /// # Errors
    ///
    /// `NameNotFound` if `from` matches no name or directory.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<MoveOutcome> {
        let from = clean_name(from);
        let to = clean_name(to);
        let mut tree = NameTree::from_names(self.index.names().iter().map(|(n, d)| (n.as_str(), d)));
        let node = tree
            .lookup(&from)
            .filter(|_| !from.is_empty())
            .ok_or_else(|| CairnError::NameNotFound(from.clone()))?;

        let (dir, base) = match to.rsplit_once('/') {
            Some((parent, base)) => (tree.mkdir(parent), base),
            None => (tree.root(), to.as_str()),
        };
        let outcome = tree.move_to(node, dir, base);
        match outcome {
            MoveOutcome::Moved | MoveOutcome::Discarded => {
                self.index.set_names_batch(tree.to_names())?;
                info!(from = %from, to = %to, ?outcome, "renamed");
            }
            MoveOutcome::Collision | MoveOutcome::Invalid => {
                warn!(from = %from, to = %to, ?outcome, "rename skipped");
            }
        }
        Ok(outcome)
    }

    /// Writes the content behind `name` to `out`.
    pub fn cat(&self, name: &str, out: &mut dyn Write) -> Result<u64> {
        let digest = self
            .index
            .get(name)
            .ok_or_else(|| CairnError::NameNotFound(name.to_string()))?;
        let path = self.store.data_path(&digest);
        let mut file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CairnError::ObjectNotFound(digest.as_hex()),
            _ => CairnError::Io(e),
        })?;
        Ok(io::copy(&mut file, out)?)
    }

    /// Reclaims objects no name refers to. See [`crate::gc()`].
    pub fn gc(&mut self, progress: Option<&GcProgressCallback<'_>>) -> Result<GcReport> {
        crate::gc::gc(&self.store, &mut self.index, progress)
    }

    /// Drops index entries whose object is gone. See [`crate::clean_missing`].
    pub fn clean_missing(&mut self) -> Result<CleanReport> {
        crate::gc::clean_missing(&self.store, &mut self.index)
    }

    /// See [`crate::fix_times`].
    pub fn fix_times(&self) -> Result<FixTimesReport> {
        crate::repair::fix_times(&self.store, &self.index)
    }

    /// See [`crate::fix_paths`].
    pub fn fix_paths(&mut self) -> FixPathsReport {
        crate::repair::fix_paths(&mut self.index)
    }

    /// See [`crate::reindex`].
    pub fn reindex(&mut self) -> Result<ReindexReport> {
        crate::repair::reindex(&self.store, &mut self.index)
    }

    /// Verifies stored objects against their metadata.
    ///
    /// Unset `max_size` and `error_log` are filled from `[scrub]` in the
    /// repository config.
    pub fn scrub(&self, options: &ScrubOptions, progress: Option<&ScrubProgressCallback<'_>>) -> Result<ScrubReport> {
        let mut options = options.clone();
        if options.max_size.is_none() {
            options.max_size = self.config.scrub.max_size;
        }
        if options.error_log.is_none() {
            options.error_log = Some(self.root.join(&self.config.scrub.error_log));
        }
        crate::scrub::scrub(&self.store, self.index.meta(), &options, self.clock.as_ref(), progress)
    }

    /// Restores missing annex objects behind the annex symlinks under
    /// `paths` by hardlinking them from this repository. With `force`,
    /// existing annex objects are replaced too.
    pub fn annex_fix<P: AsRef<Path>>(&self, paths: &[P]) -> Result<AnnexReport> {
        let mut report = AnnexReport::default();
        for root in paths {
            let annex = Annex::find(root.as_ref())?;
            for entry in walk_files(&[root]) {
                if !entry.path_is_symlink() {
                    continue;
                }
                match annex.fix_link(&self.store, entry.path(), self.options.force) {
                    Ok(FixResult::Linked) => report.linked += 1,
                    Ok(FixResult::Replaced) => report.replaced += 1,
                    Ok(FixResult::Present) => report.present += 1,
                    Ok(FixResult::NotInRepository) => report.not_in_repository += 1,
                    Ok(FixResult::NotAnnexed) => report.skipped += 1,
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "annex fix failed");
                        report.errors.push((entry.into_path(), e.to_string()));
                    }
                }
            }
        }
        Ok(report)
    }

    /// Converts plain files under `paths` that carry a cached digest into
    /// annex symlinks.
    pub fn annex_add<P: AsRef<Path>>(&self, paths: &[P]) -> Result<AnnexReport> {
        let mut report = AnnexReport::default();
        for root in paths {
            let annex = Annex::find(root.as_ref())?;
            for entry in walk_files(&[root]) {
                if !entry.file_type().is_file() {
                    continue;
                }
                match annex.add_file(entry.path(), self.options) {
                    Ok(AddResult::Added) => report.added += 1,
                    Ok(AddResult::AlreadyAnnexed) => report.already_annexed += 1,
                    Ok(AddResult::NoCachedDigest) => report.skipped += 1,
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "annex add failed");
                        report.errors.push((entry.into_path(), e.to_string()));
                    }
                }
            }
        }
        Ok(report)
    }
}

/// Walks `paths` and pairs every entry with its logical name. Names are
/// relative to each argument's parent directory. Unresolvable arguments are
/// recorded in `errors`.
fn named_entries<P: AsRef<Path>>(
    paths: &[P],
    prefix: &str,
    errors: &mut Vec<(PathBuf, String)>,
) -> Vec<(DirEntry, String)> {
    let mut out = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let root = match fs::canonicalize(path) {
            Ok(root) => root,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot resolve path");
                errors.push((path.to_path_buf(), e.to_string()));
                continue;
            }
        };
        let base = root.parent().map(Path::to_path_buf).unwrap_or_default();
        for entry in walk_files(&[&root]) {
            let rel = entry.path().strip_prefix(&base).unwrap_or(entry.path());
            let name = name_for(prefix, rel);
            out.push((entry, name));
        }
    }
    out
}

/// The part of `name` below `prefix`, if `name` is `prefix` itself or lies
/// under it. A name equal to the prefix maps to its last component.
fn relative_to<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(name);
    }
    if name == prefix {
        return Some(name.rsplit('/').next().unwrap_or(name));
    }
    name.strip_prefix(prefix)?.strip_prefix('/')
}
