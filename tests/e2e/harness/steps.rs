use std::time::Duration;

use super::assertions::Assertion;

/// Scrub switches for a [`ScenarioStep::Scrub`] step.
#[derive(Debug, Clone, Default)]
pub struct ScrubPlan {
    pub fast: bool,
    pub modified_only: bool,
    /// Resume at the n-th digest in index order.
    pub resume_at: Option<usize>,
}

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Working files
    WriteFile {
        path: String,
        content: Vec<u8>,
    },
    RemoveFile {
        path: String,
    },
    SetMtime {
        path: String,
        mtime: i64,
    },

    // Repository operations
    SetOptions {
        dry_run: bool,
        force: bool,
    },
    Import {
        paths: Vec<String>,
        prefix: String,
    },
    Copy {
        paths: Vec<String>,
        prefix: String,
    },
    Link {
        dest: String,
        prefix: String,
    },
    Pull {
        dest: String,
        prefix: String,
    },
    Delete {
        names: Vec<String>,
    },
    DeleteNames {
        names: Vec<String>,
    },
    Rename {
        from: String,
        to: String,
    },
    Gc,
    CleanMissing,
    Scrub {
        plan: ScrubPlan,
    },
    Commit,
    AutoCommit,

    // Object tampering
    /// Overwrite the object stored for `content`, keeping its size and mtime.
    CorruptObject {
        content: Vec<u8>,
        replacement: Vec<u8>,
    },
    RemoveObject {
        content: Vec<u8>,
    },

    // Time control
    Wait {
        duration: Duration,
    },

    // Failure simulation
    Crash,
    Restart,
    /// Leave half-written temporaries as an interrupted commit would.
    LeaveStaleTemporaries,

    // Verification
    Assert {
        assertion: Assertion,
    },
}
