//! Repairs: object mtimes, name normalization, and rebuilding the index from
//! legacy per-object sidecars.

use crate::backend::LegacySidecar;
use crate::digest::Digest;
use crate::error::Result;
use crate::hash_cache::{self, mtime_of};
use crate::index::{AddOutcome, Index};
use crate::object_store::ContentStore;
use crate::walk::clean_name;
use filetime::FileTime;
use std::fs;
use tracing::{debug, info, warn};

/// Report from [`fix_times`].
#[derive(Debug, Default)]
pub struct FixTimesReport {
    /// Objects looked at.
    pub checked: usize,
    /// Objects whose mtime was reset.
    pub fixed: usize,
    /// Metadata entries without an object.
    pub missing: usize,
}

/// Resets every object's mtime to the recorded metadata mtime and restamps
/// its hash cache so the cache stays valid.
pub fn fix_times(store: &ContentStore, index: &Index) -> Result<FixTimesReport> {
    let mut report = FixTimesReport::default();
    for (digest, entry) in index.meta() {
        let path = store.data_path(digest);
        let Ok(meta) = fs::metadata(&path) else {
            report.missing += 1;
            continue;
        };
        report.checked += 1;
        if mtime_of(&meta) == entry.mtime {
            continue;
        }
        debug!(digest = %digest, from = mtime_of(&meta), to = entry.mtime, "resetting mtime");
        if store.options().allow("set-mtime", &path) {
            filetime::set_file_mtime(&path, FileTime::from_unix_time(entry.mtime, 0))?;
            hash_cache::stamp(&path, digest);
        }
        report.fixed += 1;
    }
    Ok(report)
}

/// Report from [`fix_paths`].
#[derive(Debug, Default)]
pub struct FixPathsReport {
    /// Names rewritten to their canonical form.
    pub renamed: usize,
    /// Names dropped because the canonical form already existed with the
    /// same digest.
    pub merged: usize,
    /// Names left alone because the canonical form is taken by other content.
    pub collisions: Vec<String>,
}

/// Rewrites every name into canonical form (see [`clean_name`]).
pub fn fix_paths(index: &mut Index) -> FixPathsReport {
    let mut report = FixPathsReport::default();
    let pending: Vec<(String, String, Digest)> = index
        .names()
        .iter()
        .filter_map(|(name, digest)| {
            let clean = clean_name(name);
            (clean != *name).then(|| (name.clone(), clean, *digest))
        })
        .collect();

    for (old, new, digest) in pending {
        if new.is_empty() {
            warn!(name = %old.escape_debug(), "name normalizes to nothing, skipping");
            report.collisions.push(old);
            continue;
        }
        match index.get(&new) {
            Some(existing) if existing == digest => {
                index.remove_names(&[&old]);
                report.merged += 1;
            }
            Some(existing) => {
                warn!(from = %old.escape_debug(), to = %new, existing = %existing, "collision, skipping");
                report.collisions.push(old);
            }
            None => {
                index.remove_names(&[&old]);
                index.add_name(digest, &new, false);
                report.renamed += 1;
            }
        }
    }
    report
}

/// Report from [`reindex`].
#[derive(Debug, Default)]
pub struct ReindexReport {
    /// Sidecar files read.
    pub sidecars: usize,
    /// Names added to the index.
    pub names_added: usize,
    /// Names that had to take a numeric suffix to avoid a collision.
    pub names_suffixed: usize,
    /// Objects without metadata that were registered from the filesystem.
    pub unindexed_objects: usize,
    /// Sidecars that could not be read.
    pub errors: Vec<String>,
}

/// Folds legacy `<object>.m` sidecars into the index, then registers
/// metadata for any object the index does not know about.
///
/// A sidecar name already taken by other content is stored as `name.1`,
/// `name.2`, and so on.
pub fn reindex(store: &ContentStore, index: &mut Index) -> Result<ReindexReport> {
    let mut report = ReindexReport::default();

    for (digest, path) in store.list_sidecars()? {
        if !store.exists(&digest) {
            warn!(sidecar = %path.display(), "sidecar without object, skipping");
            continue;
        }
        let sidecar = match LegacySidecar::read(&path) {
            Ok(s) => s,
            Err(e) => {
                warn!(sidecar = %path.display(), error = %e, "unreadable sidecar");
                report.errors.push(format!("{}: {}", path.display(), e));
                continue;
            }
        };
        report.sidecars += 1;

        let (size, mtime) = store.stat(&digest)?;
        index.add_meta(
            digest,
            sidecar.size.unwrap_or(size),
            sidecar.mtime.unwrap_or(mtime),
        );

        for name in &sidecar.names {
            let name = clean_name(name);
            if name.is_empty() {
                continue;
            }
            let mut candidate = name.clone();
            let mut n = 1;
            loop {
                match index.add_name(digest, &candidate, false) {
                    AddOutcome::Added => {
                        report.names_added += 1;
                        if n > 1 {
                            report.names_suffixed += 1;
                        }
                        break;
                    }
                    AddOutcome::Unchanged | AddOutcome::Replaced { .. } | AddOutcome::Rejected => break,
                    AddOutcome::Conflict { .. } => {
                        candidate = format!("{}.{}", name, n);
                        n += 1;
                    }
                }
            }
        }
    }

    for digest in store.list_digests()? {
        if index.meta_of(&digest).is_none() {
            let (size, mtime) = store.stat(&digest)?;
            index.add_meta(digest, size, mtime);
            report.unindexed_objects += 1;
        }
    }

    info!(
        sidecars = report.sidecars,
        names = report.names_added,
        "reindex finished"
    );
    Ok(report)
}
