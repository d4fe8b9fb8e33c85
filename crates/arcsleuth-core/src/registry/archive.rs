/// One archive replica: its tree, browse cursor and lifecycle.
use crate::model::{ArchiveTree, NodeIndex};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of an archive within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveState {
    /// The scanner is still walking the tree.
    Scanning,
    /// The walk finished; files are being hashed.
    Hashing,
    /// Every file is hashed.
    Ready,
    /// A reconciliation copy is running.
    Copying,
}

impl ArchiveState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scanning => "scanning",
            Self::Hashing => "hashing",
            Self::Ready => "ready",
            Self::Copying => "copying",
        }
    }

    /// `true` once the scanner has nothing left to report for this archive.
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Scanning | Self::Hashing)
    }
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scanning" => Ok(Self::Scanning),
            "hashing" => Ok(Self::Hashing),
            "ready" => Ok(Self::Ready),
            "copying" => Ok(Self::Copying),
            _ => Err(()),
        }
    }
}

/// A registered root and everything known about it.
#[derive(Debug, Clone)]
pub struct Archive {
    /// Root identifier as given in `scan`.
    pub root: String,
    /// Registration index; slot of this archive in presence vectors.
    pub idx: usize,
    pub tree: ArchiveTree,
    /// Folder currently browsed in this archive.
    pub current: NodeIndex,
    pub state: ArchiveState,
    /// Set on every change, cleared when a frame is rendered.
    pub dirty: bool,
}

impl Archive {
    /// Create an archive holding only its empty root folder.
    pub fn new(root: impl Into<String>, idx: usize) -> Self {
        Self {
            root: root.into(),
            idx,
            tree: ArchiveTree::new(),
            current: ArchiveTree::ROOT,
            state: ArchiveState::Scanning,
            dirty: true,
        }
    }
}
