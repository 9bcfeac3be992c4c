//! Integrity verification of stored objects.
//!
//! Scrub walks every digest with a metadata entry, in digest order, and
//! checks the object from cheapest to most expensive: presence, size, then
//! (unless fast) a full rehash. A finding for one digest never stops the
//! walk. Findings are appended to the scrub error log, which is never
//! truncated.

use crate::backend::MetaEntry;
use crate::digest::{hash_file, Digest};
use crate::error::Result;
use crate::hash_cache::{self, mtime_of};
use crate::object_store::ContentStore;
use crate::TimeProvider;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Progress callback for scrub.
/// Called with (current, total, digest) before each digest is checked.
pub type ScrubProgressCallback<'a> = dyn Fn(usize, usize, &Digest) + 'a;

/// Scrub settings for one run.
#[derive(Debug, Clone, Default)]
pub struct ScrubOptions {
    /// Check presence and size only, never rehash.
    pub fast: bool,

    /// Skip objects whose hash cache is still valid for their mtime.
    pub modified_only: bool,

    /// Skip every digest ordered before this one.
    pub resume_from: Option<Digest>,

    /// Skip objects larger than this many bytes.
    pub max_size: Option<u64>,

    /// Append findings here. `None` logs only through tracing.
    pub error_log: Option<PathBuf>,
}

/// Why a digest was not checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Ordered before the resume checkpoint.
    BeforeCheckpoint,
    /// Larger than the size ceiling.
    TooLarge,
    /// Hash cache still valid in a modified-only run.
    Unmodified,
}

/// Outcome for one digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrubStatus {
    /// Everything matched.
    Ok,
    /// Not checked.
    Skipped(SkipReason),
    /// No object file.
    Missing,
    /// Object size differs from metadata.
    SizeMismatch {
        /// Size recorded in the index
        expected: u64,
        /// Size on disk
        actual: u64,
    },
    /// Content no longer hashes to its digest.
    ChecksumMismatch {
        /// Digest of the bytes on disk
        actual: Digest,
    },
    /// The object could not be read.
    Unreadable(String),
}

impl ScrubStatus {
    /// True for the states that indicate damage.
    pub fn is_error(&self) -> bool {
        !matches!(self, ScrubStatus::Ok | ScrubStatus::Skipped(_))
    }

    fn kind(&self) -> &'static str {
        match self {
            ScrubStatus::Ok => "ok",
            ScrubStatus::Skipped(_) => "skipped",
            ScrubStatus::Missing => "missing",
            ScrubStatus::SizeMismatch { .. } => "size-mismatch",
            ScrubStatus::ChecksumMismatch { .. } => "checksum-mismatch",
            ScrubStatus::Unreadable(_) => "unreadable",
        }
    }
}

impl fmt::Display for ScrubStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrubStatus::SizeMismatch { expected, actual } => {
                write!(f, "{} expected={} actual={}", self.kind(), expected, actual)
            }
            ScrubStatus::ChecksumMismatch { actual } => {
                write!(f, "{} actual={}", self.kind(), actual)
            }
            ScrubStatus::Unreadable(e) => write!(f, "{} {}", self.kind(), e),
            ScrubStatus::Skipped(reason) => write!(f, "{} {:?}", self.kind(), reason),
            _ => f.write_str(self.kind()),
        }
    }
}

/// Report from a scrub run.
#[derive(Debug, Default)]
pub struct ScrubReport {
    /// Digests considered, skipped ones included.
    pub total: usize,

    /// Digests that were actually checked.
    pub checked: usize,

    /// Checked digests that matched.
    pub ok: usize,

    /// Digests skipped by checkpoint, size ceiling or modified-only.
    pub skipped: usize,

    /// Object caches rewritten after a full match.
    pub cache_repaired: usize,

    /// Every damaged digest with its finding, in scrub order.
    pub failures: Vec<(Digest, ScrubStatus)>,
}

impl ScrubReport {
    /// Returns true if any damage was found.
    pub fn has_issues(&self) -> bool {
        !self.failures.is_empty()
    }

    fn count(&self, pred: impl Fn(&ScrubStatus) -> bool) -> usize {
        self.failures.iter().filter(|(_, s)| pred(s)).count()
    }

    /// Objects with no data file.
    pub fn missing(&self) -> usize {
        self.count(|s| matches!(s, ScrubStatus::Missing))
    }

    /// Objects whose size is wrong.
    pub fn size_errors(&self) -> usize {
        self.count(|s| matches!(s, ScrubStatus::SizeMismatch { .. }))
    }

    /// Objects whose content is corrupt.
    pub fn checksum_errors(&self) -> usize {
        self.count(|s| matches!(s, ScrubStatus::ChecksumMismatch { .. }))
    }

    /// Returns a summary message.
    pub fn summary(&self) -> String {
        if !self.has_issues() {
            format!(
                "{} objects checked, {} skipped, no issues found.",
                self.checked, self.skipped
            )
        } else {
            let mut issues = Vec::new();
            for (label, n) in [
                ("missing", self.missing()),
                ("size mismatches", self.size_errors()),
                ("checksum mismatches", self.checksum_errors()),
                (
                    "unreadable",
                    self.count(|s| matches!(s, ScrubStatus::Unreadable(_))),
                ),
            ] {
                if n > 0 {
                    issues.push(format!("{} {}", n, label));
                }
            }
            format!(
                "{} objects checked, {} skipped. Found: {}",
                self.checked,
                self.skipped,
                issues.join(", ")
            )
        }
    }
}

/// Append-only scrub log, opened once per run.
struct ScrubLog {
    file: Option<File>,
}

impl ScrubLog {
    fn open(path: Option<&Path>, writable: bool) -> io::Result<Self> {
        let file = match path {
            Some(path) if writable => Some(OpenOptions::new().create(true).append(true).open(path)?),
            _ => None,
        };
        Ok(Self { file })
    }

    fn record(&mut self, now: i64, digest: &Digest, status: &ScrubStatus) {
        warn!(digest = %digest, finding = %status, "scrub finding");
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = writeln!(file, "{} {} {} {}", now, status.kind(), digest, status) {
                warn!(error = %e, "failed to append to scrub log");
            }
        }
    }
}

/// Verifies stored objects against their metadata.
///
/// # Examples
///
/// ```no_run
/// use cairn_core::{Repo, ScrubOptions};
///
/// let repo = Repo::open("/srv/archive").unwrap();
/// let report = repo.scrub(&ScrubOptions::default(), None).unwrap();
///
/// if report.has_issues() {
///     eprintln!("{}", report.summary());
/// }
/// ```
pub fn scrub(
    store: &ContentStore,
    meta: &BTreeMap<Digest, MetaEntry>,
    options: &ScrubOptions,
    clock: &dyn TimeProvider,
    progress: Option<&ScrubProgressCallback<'_>>,
) -> Result<ScrubReport> {
    let writable = match options.error_log.as_deref() {
        Some(path) => store.options().allow("append-scrub-log", path),
        None => false,
    };
    let mut log = ScrubLog::open(options.error_log.as_deref(), writable)?;
    let mut report = ScrubReport {
        total: meta.len(),
        ..ScrubReport::default()
    };

    for (i, (digest, entry)) in meta.iter().enumerate() {
        if let Some(cb) = progress {
            cb(i + 1, meta.len(), digest);
        }

        let status = check_one(store, digest, entry, options, &mut report);
        match &status {
            ScrubStatus::Ok => {
                report.checked += 1;
                report.ok += 1;
            }
            ScrubStatus::Skipped(reason) => {
                debug!(digest = %digest, ?reason, "skipped");
                report.skipped += 1;
            }
            _ => {
                report.checked += 1;
                log.record(clock.now(), digest, &status);
                report.failures.push((*digest, status));
            }
        }
    }

    info!(
        checked = report.checked,
        skipped = report.skipped,
        failures = report.failures.len(),
        "scrub finished"
    );
    Ok(report)
}

fn check_one(
    store: &ContentStore,
    digest: &Digest,
    entry: &MetaEntry,
    options: &ScrubOptions,
    report: &mut ScrubReport,
) -> ScrubStatus {
    if options.resume_from.is_some_and(|checkpoint| *digest < checkpoint) {
        return ScrubStatus::Skipped(SkipReason::BeforeCheckpoint);
    }

    let path = store.data_path(digest);
    let on_disk = match fs::metadata(&path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => return ScrubStatus::Missing,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return ScrubStatus::Missing,
        Err(e) => return ScrubStatus::Unreadable(e.to_string()),
    };

    if on_disk.len() != entry.size {
        return ScrubStatus::SizeMismatch {
            expected: entry.size,
            actual: on_disk.len(),
        };
    }

    if options.max_size.is_some_and(|max| entry.size > max) {
        return ScrubStatus::Skipped(SkipReason::TooLarge);
    }

    let mtime = mtime_of(&on_disk);
    if options.modified_only
        && hash_cache::cached_entry(&path) == Some((mtime, *digest))
    {
        return ScrubStatus::Skipped(SkipReason::Unmodified);
    }

    if options.fast {
        return ScrubStatus::Ok;
    }

    let actual = match hash_file(&path) {
        Ok(actual) => actual,
        Err(e) => return ScrubStatus::Unreadable(e.to_string()),
    };
    if actual != *digest {
        return ScrubStatus::ChecksumMismatch { actual };
    }

    if hash_cache::cached_entry(&path) != Some((mtime, *digest))
        && store.options().allow("repair-cache", &path)
    {
        match hash_cache::write_cached_digest(&path, digest, mtime) {
            Ok(()) => report.cache_repaired += 1,
            Err(e) => debug!(digest = %digest, error = %e, "could not repair hash cache"),
        }
    }

    ScrubStatus::Ok
}
