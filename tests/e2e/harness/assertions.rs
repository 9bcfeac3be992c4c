use anyhow::Result;
use cairn_core::Repo;

/// Declarative assertions on repository state
pub enum Assertion {
    // Names
    NameMapsTo {
        name: String,
        content: Vec<u8>,
    },
    NameAbsent {
        name: String,
    },
    NameCount(usize),
    /// Names visible to a freshly opened handle.
    CommittedNameCount(usize),
    IndexDirty(bool),

    // Objects
    ObjectCount(usize),
    DeletedCount(usize),
    /// The working file is a hardlink to the object behind `name`.
    LinkedToObject {
        path: String,
        name: String,
    },

    // Working files
    FileContent {
        path: String,
        content: Vec<u8>,
    },
    FileAbsent {
        path: String,
    },

    // Last import
    ImportStored(usize),
    ImportDeduplicated(usize),
    ImportUnchanged(usize),
    ImportConflicts(Vec<String>),

    // Last link/pull
    MaterializeCreated(usize),
    MaterializeExisting(usize),

    // Last scrub
    ScrubChecked(usize),
    ScrubSkipped(usize),
    ScrubClean,
    ScrubMissing(usize),
    ScrubChecksumErrors(usize),
    ScrubLogLines(usize),

    // Custom (takes mutable reference to allow mutations)
    Custom(Box<dyn Fn(&mut Repo) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameMapsTo { name, .. } => write!(f, "NameMapsTo {{ name: {:?} }}", name),
            Self::NameAbsent { name } => write!(f, "NameAbsent {{ name: {:?} }}", name),
            Self::NameCount(n) => write!(f, "NameCount({})", n),
            Self::CommittedNameCount(n) => write!(f, "CommittedNameCount({})", n),
            Self::IndexDirty(b) => write!(f, "IndexDirty({})", b),
            Self::ObjectCount(n) => write!(f, "ObjectCount({})", n),
            Self::DeletedCount(n) => write!(f, "DeletedCount({})", n),
            Self::LinkedToObject { path, name } => {
                write!(f, "LinkedToObject {{ path: {:?}, name: {:?} }}", path, name)
            }
            Self::FileContent { path, .. } => write!(f, "FileContent {{ path: {:?} }}", path),
            Self::FileAbsent { path } => write!(f, "FileAbsent {{ path: {:?} }}", path),
            Self::ImportStored(n) => write!(f, "ImportStored({})", n),
            Self::ImportDeduplicated(n) => write!(f, "ImportDeduplicated({})", n),
            Self::ImportUnchanged(n) => write!(f, "ImportUnchanged({})", n),
            Self::ImportConflicts(names) => write!(f, "ImportConflicts({:?})", names),
            Self::MaterializeCreated(n) => write!(f, "MaterializeCreated({})", n),
            Self::MaterializeExisting(n) => write!(f, "MaterializeExisting({})", n),
            Self::ScrubChecked(n) => write!(f, "ScrubChecked({})", n),
            Self::ScrubSkipped(n) => write!(f, "ScrubSkipped({})", n),
            Self::ScrubClean => write!(f, "ScrubClean"),
            Self::ScrubMissing(n) => write!(f, "ScrubMissing({})", n),
            Self::ScrubChecksumErrors(n) => write!(f, "ScrubChecksumErrors({})", n),
            Self::ScrubLogLines(n) => write!(f, "ScrubLogLines({})", n),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}
