//! Reclaiming orphaned objects and dropping dangling index entries.
//!
//! Deleting a name never deletes content. An object becomes collectable once
//! no name references its digest; [`gc`] removes such objects together with
//! their metadata. [`clean_missing`] handles the opposite case: index
//! entries whose object is gone.

use crate::digest::Digest;
use crate::error::Result;
use crate::index::Index;
use crate::object_store::ContentStore;
use std::collections::HashSet;
use tracing::{info, warn};

/// Progress callback for GC operations.
/// Called with (current, total, digest-hex).
pub type GcProgressCallback<'a> = dyn Fn(usize, usize, &str) + 'a;

/// Report from garbage collection.
#[derive(Debug, Default)]
pub struct GcReport {
    /// Orphaned digests found.
    pub orphans: usize,

    /// Object files deleted.
    pub objects_deleted: usize,

    /// Bytes freed from deletion, per recorded metadata.
    pub bytes_freed: u64,

    /// Errors encountered during GC (non-fatal).
    pub errors: Vec<String>,
}

/// Removes the objects and metadata of every digest with no names.
///
/// The index without the orphans' metadata is committed before any object
/// is unlinked. If the commit fails nothing is deleted. An object whose
/// unlink fails stays on disk unindexed until `reindex` registers it again.
pub fn gc(
    store: &ContentStore,
    index: &mut Index,
    progress: Option<&GcProgressCallback<'_>>,
) -> Result<GcReport> {
    let orphans: Vec<(Digest, u64)> = index
        .deleted()
        .map(|d| (d, index.meta_of(&d).map(|m| m.size).unwrap_or(0)))
        .collect();
    let mut report = GcReport {
        orphans: orphans.len(),
        ..GcReport::default()
    };

    for (digest, _) in &orphans {
        index.remove_meta(digest);
    }
    index.commit()?;

    for (i, (digest, size)) in orphans.iter().enumerate() {
        if let Some(cb) = progress {
            cb(i + 1, orphans.len(), &digest.as_hex());
        }
        match store.remove(digest) {
            Ok(true) => {
                report.objects_deleted += 1;
                report.bytes_freed += size;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(digest = %digest, error = %e, "failed to remove object");
                report.errors.push(format!("{}: {}", digest, e));
            }
        }
    }

    info!(
        deleted = report.objects_deleted,
        bytes = report.bytes_freed,
        "garbage collection finished"
    );
    Ok(report)
}

/// Report from [`clean_missing`].
#[derive(Debug, Default)]
pub struct CleanReport {
    /// Digests whose object file is missing.
    pub missing_objects: usize,

    /// Names dropped because their content is gone.
    pub names_removed: usize,
}

/// Drops names and metadata whose object is absent from the store.
pub fn clean_missing(store: &ContentStore, index: &mut Index) -> Result<CleanReport> {
    let mut candidates: HashSet<Digest> = index.meta().keys().copied().collect();
    candidates.extend(index.names().values().copied());

    let missing: Vec<Digest> = candidates
        .into_iter()
        .filter(|d| !store.exists(d))
        .collect();

    for digest in &missing {
        for name in index.names_for(digest) {
            info!(name, digest = %digest, "object missing, dropping name");
        }
    }
    let names_removed = index.remove_by_digest(&missing);
    for digest in &missing {
        index.remove_meta(digest);
    }

    Ok(CleanReport {
        missing_objects: missing.len(),
        names_removed,
    })
}
