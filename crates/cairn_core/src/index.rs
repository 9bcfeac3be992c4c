//! In-memory name and metadata index.
//!
//! The whole index is loaded on open and mutated in memory. Mutations only set
//! a dirty flag; [`Index::commit`] writes everything back through the backend
//! under the exclusive repository lock.

use crate::backend::{check_name, IndexBackend, IndexSnapshot, MetaEntry};
use crate::config::Options;
use crate::digest::Digest;
use crate::error::Result;
use crate::lock::RepoLock;
use crate::{SystemClock, TimeProvider};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What [`Index::add_name`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The name was new.
    Added,
    /// The name already pointed at this digest.
    Unchanged,
    /// The name pointed elsewhere and was overwritten.
    Replaced {
        /// Digest the name used to map to
        previous: Digest,
    },
    /// The name points elsewhere and was left alone.
    Conflict {
        /// Digest the name still maps to
        existing: Digest,
    },
    /// The name cannot be stored (empty, or contains a line break).
    Rejected,
}

/// Fully loaded name/metadata index.
pub struct Index {
    backend: Box<dyn IndexBackend>,
    lock: RepoLock,
    options: Options,
    clock: Arc<dyn TimeProvider>,
    auto_commit_every: Duration,
    last_commit: i64,
    data: IndexSnapshot,
    dirty: bool,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("backend", &self.backend.name())
            .field("names", &self.data.names.len())
            .field("digests", &self.data.meta.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Index {
    /// Loads the index under a shared lock.
    pub fn load(backend: Box<dyn IndexBackend>, lock: RepoLock) -> Result<Self> {
        let data = {
            let _guard = lock.shared()?;
            backend.load()?
        };
        let clock: Arc<dyn TimeProvider> = Arc::new(SystemClock);
        let last_commit = clock.now();
        Ok(Self {
            backend,
            lock,
            options: Options::default(),
            clock,
            auto_commit_every: Duration::from_secs(30),
            last_commit,
            data,
            dirty: false,
        })
    }

    /// Sets the dry-run/force options consulted at commit.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Replaces the clock used by [`Index::auto_commit`].
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.last_commit = clock.now();
        self.clock = clock;
        self
    }

    /// Sets the minimum time between automatic commits.
    pub fn with_auto_commit(mut self, every: Duration) -> Self {
        self.auto_commit_every = every;
        self
    }

    /// True when there are uncommitted changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All names, sorted.
    pub fn names(&self) -> &BTreeMap<String, Digest> {
        &self.data.names
    }

    /// All metadata entries, sorted by digest.
    pub fn meta(&self) -> &BTreeMap<Digest, MetaEntry> {
        &self.data.meta
    }

    /// Digest a name maps to.
    pub fn get(&self, name: &str) -> Option<Digest> {
        self.data.names.get(name).copied()
    }

    /// Metadata for a digest.
    pub fn meta_of(&self, digest: &Digest) -> Option<MetaEntry> {
        self.data.meta.get(digest).copied()
    }

    /// Dedup pre-check: the digest `name` maps to, but only if its recorded
    /// size is `size`.
    pub fn find_by_name_and_size(&self, name: &str, size: u64) -> Option<Digest> {
        let digest = self.data.names.get(name)?;
        let meta = self.data.meta.get(digest)?;
        (meta.size == size).then_some(*digest)
    }

    /// Maps `name` to `digest`. An existing different mapping is only
    /// replaced when `overwrite` is set.
    pub fn add_name(&mut self, digest: Digest, name: &str, overwrite: bool) -> AddOutcome {
        if let Err(e) = check_name(name) {
            warn!(error = %e, "name rejected");
            return AddOutcome::Rejected;
        }
        match self.data.names.get(name).copied() {
            None => {
                self.data.names.insert(name.to_string(), digest);
                self.dirty = true;
                AddOutcome::Added
            }
            Some(existing) if existing == digest => AddOutcome::Unchanged,
            Some(existing) if overwrite => {
                self.data.names.insert(name.to_string(), digest);
                self.dirty = true;
                info!(name, from = %existing, to = %digest, "name overwritten");
                AddOutcome::Replaced { previous: existing }
            }
            Some(existing) => {
                warn!(name, existing = %existing, requested = %digest, "name conflict");
                AddOutcome::Conflict { existing }
            }
        }
    }

    /// Records size and mtime for a digest, keeping the earliest mtime.
    pub fn add_meta(&mut self, digest: Digest, size: u64, mtime: i64) {
        match self.data.meta.get_mut(&digest) {
            None => {
                self.data.meta.insert(digest, MetaEntry { size, mtime });
                self.dirty = true;
            }
            Some(entry) => {
                if entry.size != size {
                    warn!(digest = %digest, recorded = entry.size, seen = size, "size changed for digest");
                    entry.size = size;
                    self.dirty = true;
                }
                if mtime < entry.mtime {
                    entry.mtime = mtime;
                    self.dirty = true;
                }
            }
        }
    }

    /// Bulk replacement. Every existing name of every digest in `batch` is
    /// dropped, then `batch` is inserted. A batch holding any unstorable
    /// name is refused whole.
    pub fn set_names_batch(&mut self, batch: BTreeMap<String, Digest>) -> Result<()> {
        for name in batch.keys() {
            check_name(name)?;
        }
        let touched: HashSet<Digest> = batch.values().copied().collect();
        let mut dropped = BTreeMap::new();
        self.data.names.retain(|name, digest| {
            if touched.contains(digest) {
                dropped.insert(name.clone(), *digest);
                false
            } else {
                true
            }
        });

        let mut changed = false;
        for (name, digest) in batch {
            match self.data.names.insert(name.clone(), digest) {
                Some(_) => changed = true,
                None => changed |= dropped.remove(&name) != Some(digest),
            }
        }
        changed |= !dropped.is_empty();
        self.dirty |= changed;
        debug!(changed, "applied name batch");
        Ok(())
    }

    /// Removes the given names. Returns how many existed.
    pub fn remove_names<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut removed = 0;
        for name in names {
            if self.data.names.remove(name.as_ref()).is_some() {
                removed += 1;
            }
        }
        self.dirty |= removed > 0;
        removed
    }

    /// Removes every name pointing at any of `digests`. Metadata stays.
    pub fn remove_by_digest(&mut self, digests: &[Digest]) -> usize {
        let doomed: HashSet<&Digest> = digests.iter().collect();
        let before = self.data.names.len();
        self.data.names.retain(|_, d| !doomed.contains(d));
        let removed = before - self.data.names.len();
        self.dirty |= removed > 0;
        removed
    }

    /// Drops the metadata entry of a digest.
    pub fn remove_meta(&mut self, digest: &Digest) -> bool {
        let removed = self.data.meta.remove(digest).is_some();
        self.dirty |= removed;
        removed
    }

    /// Digests with metadata but no names, i.e. garbage-collectable objects.
    pub fn deleted(&self) -> impl Iterator<Item = Digest> + '_ {
        let live: HashSet<Digest> = self.data.names.values().copied().collect();
        self.data
            .meta
            .keys()
            .copied()
            .filter(move |d| !live.contains(d))
    }

    /// Names mapped to `digest`, sorted.
    pub fn names_for(&self, digest: &Digest) -> Vec<&str> {
        self.data
            .names
            .iter()
            .filter(|(_, d)| *d == digest)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Names starting with `prefix`, sorted.
    pub fn list_names<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, Digest)> + 'a {
        self.data
            .names
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(n, _)| n.starts_with(prefix))
            .map(|(n, d)| (n.as_str(), *d))
    }

    /// Digests reachable under more than one name.
    pub fn duplicates(&self) -> BTreeMap<Digest, Vec<&str>> {
        let mut by_digest: BTreeMap<Digest, Vec<&str>> = BTreeMap::new();
        for (name, digest) in &self.data.names {
            by_digest.entry(*digest).or_default().push(name.as_str());
        }
        by_digest.retain(|_, names| names.len() > 1);
        by_digest
    }

    /// Writes the index back if anything changed. Returns whether a write
    /// happened.
    pub fn commit(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        if !self.options.allow("commit", self.lock.path().parent().unwrap_or(Path::new("."))) {
            return Ok(false);
        }

        let _guard = self.lock.exclusive()?;
        self.backend.save(&self.data)?;
        self.dirty = false;
        self.last_commit = self.clock.now();
        info!(
            backend = self.backend.name(),
            names = self.data.names.len(),
            digests = self.data.meta.len(),
            "index committed"
        );
        Ok(true)
    }

    /// Commits when the auto-commit interval has elapsed since the last
    /// commit. Meant to be called once per item in long walks.
    pub fn auto_commit(&mut self) -> Result<bool> {
        let elapsed = self.clock.now() - self.last_commit;
        if elapsed < self.auto_commit_every.as_secs() as i64 {
            return Ok(false);
        }
        debug!(elapsed, "auto-commit interval reached");
        self.last_commit = self.clock.now();
        self.commit()
    }
}
