/// A single node ("meta") in an archive's arena-allocated tree.
///
/// Nodes live in a flat `Vec<Meta>` owned by [`super::ArchiveTree`].
/// The parent link is a plain index: it is only ever used to walk upward
/// for aggregation and path reconstruction, never for ownership.
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Lightweight index into the arena `Vec<Meta>`.
///
/// Uses `u32` to keep nodes small; supports up to ~4 billion nodes per
/// archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Whether a node is a regular file or a folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    File,
    Folder,
}

impl Kind {
    /// Single-letter wire form: `R` for regular files, `F` for folders.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "R",
            Self::Folder => "F",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "R" => Ok(Self::File),
            "F" => Ok(Self::Folder),
            _ => Err(()),
        }
    }
}

/// Reconciliation state of a node.
///
/// Variants are declared in severity order so the derived `Ord` is the
/// aggregation order: a folder takes the maximum state of its children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum State {
    /// Hashed and consistent across replicas (also the empty-folder identity).
    #[default]
    Resolved,
    /// Seen by the walker, not yet hashed.
    Scanned,
    /// Hashing in progress.
    Hashing,
    /// Waiting on a reconciliation action.
    Pending,
    /// Content hash is missing, duplicated or renamed in some replica.
    Divergent,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Scanned => "scanned",
            Self::Hashing => "hashing",
            Self::Pending => "pending",
            Self::Divergent => "divergent",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resolved" => Ok(Self::Resolved),
            "scanned" => Ok(Self::Scanned),
            "hashing" => Ok(Self::Hashing),
            "pending" => Ok(Self::Pending),
            "divergent" => Ok(Self::Divergent),
            _ => Err(()),
        }
    }
}

/// A single file or folder in an archive tree.
#[derive(Debug, Clone)]
pub struct Meta {
    pub kind: Kind,

    /// File or folder name only. Full paths are rebuilt by walking `parent`.
    pub name: CompactString,

    /// Back-reference to the owning folder. `None` only for the archive root.
    pub parent: Option<NodeIndex>,

    /// Logical size in bytes. For folders: sum over direct children.
    pub size: u64,

    /// Last modification time. For folders: max over direct children,
    /// `None` while the folder is empty.
    pub mod_time: Option<DateTime<Utc>>,

    pub state: State,

    /// Bytes hashed so far. For folders: sum over direct children.
    pub progress: u64,

    /// Content hash, files only. `None` until `file-hashed` arrives.
    pub hash: Option<String>,

    /// Per-root presence counts, indexed by archive registration order.
    /// Empty unless discrepancy analysis flagged this file.
    pub counts: Vec<u32>,

    /// Number of files below this folder (1 for a file node).
    pub file_count: u64,

    /// Children keyed by name (folders only).
    pub children: HashMap<CompactString, NodeIndex>,
}

impl Meta {
    /// Create a folder node. Empty folders aggregate to the identity values.
    pub fn new_folder(name: impl Into<CompactString>, parent: Option<NodeIndex>) -> Self {
        Self {
            kind: Kind::Folder,
            name: name.into(),
            parent,
            size: 0,
            mod_time: None,
            state: State::Resolved,
            progress: 0,
            hash: None,
            counts: Vec::new(),
            file_count: 0,
            children: HashMap::new(),
        }
    }

    /// Create a freshly scanned file node.
    pub fn new_file(
        name: impl Into<CompactString>,
        parent: Option<NodeIndex>,
        size: u64,
        mod_time: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: Kind::File,
            name: name.into(),
            parent,
            size,
            mod_time: Some(mod_time),
            state: State::Scanned,
            progress: 0,
            hash: None,
            counts: Vec::new(),
            file_count: 1,
            children: HashMap::new(),
        }
    }

    #[inline]
    pub fn is_folder(&self) -> bool {
        self.kind == Kind::Folder
    }
}
