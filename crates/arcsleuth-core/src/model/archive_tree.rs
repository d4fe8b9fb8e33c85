/// Arena-backed tree for one archive, with O(depth) upward aggregation.
///
/// All nodes live in a single `Vec<Meta>`. Folders own their children
/// through a name-keyed map of `NodeIndex`; each child keeps a plain
/// `parent` index so updates can walk straight to the root without any
/// reference cycle.
///
/// Paths are `/`-joined names relative to the archive root. The empty
/// string is the root folder itself.
use super::meta::{Kind, Meta, NodeIndex, State};
use compact_str::CompactString;
use thiserror::Error;

/// Structural errors raised while resolving paths.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// A path segment that must be a folder names an existing file.
    #[error("{path:?} is a file, expected a folder")]
    NotAFolder { path: String },
}

/// The tree of one archive replica.
#[derive(Debug, Clone)]
pub struct ArchiveTree {
    /// Arena: every node in a flat vector. Index 0 is the root folder.
    nodes: Vec<Meta>,
}

impl Default for ArchiveTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveTree {
    /// Index of the root folder.
    pub const ROOT: NodeIndex = NodeIndex(0);

    /// Create a tree holding only an empty, unnamed root folder.
    pub fn new() -> Self {
        Self {
            nodes: vec![Meta::new_folder("", None)],
        }
    }

    /// Insert `child` under `parent`, keyed by its name, and return its index.
    ///
    /// Last insertion wins on a duplicate name: the previous node stays in
    /// the arena but is no longer reachable from its parent.
    pub fn add_child(&mut self, parent: NodeIndex, mut child: Meta) -> NodeIndex {
        debug_assert!(self.nodes[parent.idx()].is_folder(), "parent must be a folder");
        let idx = NodeIndex::new(self.nodes.len());
        child.parent = Some(parent);
        let name = child.name.clone();
        self.nodes.push(child);
        self.nodes[parent.idx()].children.insert(name, idx);
        idx
    }

    /// Re-aggregate every folder from `node` (or its parent, for files) up
    /// to the root.
    ///
    /// Each ancestor is recomputed as a fold over its *direct* children, so
    /// the cost is O(depth × fan-out) rather than a full subtree walk.
    pub fn recompute_upward(&mut self, node: NodeIndex) {
        let start = &self.nodes[node.idx()];
        let mut current = if start.is_folder() {
            Some(node)
        } else {
            start.parent
        };
        while let Some(idx) = current {
            self.fold_children(idx);
            current = self.nodes[idx.idx()].parent;
        }
    }

    /// Recompute one folder's size, modification time, state, progress and
    /// file count from its direct children.
    fn fold_children(&mut self, folder: NodeIndex) {
        let mut size = 0u64;
        let mut progress = 0u64;
        let mut file_count = 0u64;
        let mut mod_time = None;
        let mut state = State::Resolved;

        for &child in self.nodes[folder.idx()].children.values() {
            let child = &self.nodes[child.idx()];
            size += child.size;
            progress += child.progress;
            file_count += child.file_count;
            mod_time = mod_time.max(child.mod_time);
            state = state.max(child.state);
        }

        let node = &mut self.nodes[folder.idx()];
        node.size = size;
        node.progress = progress;
        node.file_count = file_count;
        node.mod_time = mod_time;
        node.state = state;
    }

    /// Names from the root down to `node`. Empty for the root itself.
    pub fn path(&self, node: NodeIndex) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut current = node;
        while let Some(parent) = self.nodes[current.idx()].parent {
            segments.push(self.nodes[current.idx()].name.as_str());
            current = parent;
        }
        segments.reverse();
        segments
    }

    /// The wire form of [`ArchiveTree::path`].
    pub fn path_string(&self, node: NodeIndex) -> String {
        self.path(node).join("/")
    }

    /// Find the node addressed by `path`, if it exists.
    pub fn lookup(&self, path: &str) -> Option<NodeIndex> {
        let mut current = Self::ROOT;
        for name in segments(path) {
            current = *self.nodes[current.idx()].children.get(name)?;
        }
        Some(current)
    }

    /// Resolve `path` to a folder, creating every missing folder on the way.
    pub fn ensure_folder(&mut self, path: &str) -> Result<NodeIndex, TreeError> {
        let mut current = Self::ROOT;
        for name in segments(path) {
            let existing = self.nodes[current.idx()].children.get(name).copied();
            current = match existing {
                Some(child) if self.nodes[child.idx()].is_folder() => child,
                Some(child) => {
                    return Err(TreeError::NotAFolder {
                        path: self.path_string(child),
                    })
                }
                None => self.add_child(current, Meta::new_folder(CompactString::new(name), None)),
            };
        }
        Ok(current)
    }

    /// Direct children of `folder` (unordered).
    pub fn children(&self, folder: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes[folder.idx()].children.values().copied()
    }

    /// Indices of every file node reachable from the root.
    pub fn files(&self) -> Vec<NodeIndex> {
        let mut files = Vec::new();
        let mut stack = vec![Self::ROOT];
        while let Some(idx) = stack.pop() {
            for child in self.children(idx) {
                match self.nodes[child.idx()].kind {
                    Kind::File => files.push(child),
                    Kind::Folder => stack.push(child),
                }
            }
        }
        files
    }

    #[inline]
    pub fn root(&self) -> &Meta {
        &self.nodes[Self::ROOT.idx()]
    }

    #[inline]
    pub fn node(&self, index: NodeIndex) -> &Meta {
        &self.nodes[index.idx()]
    }

    #[inline]
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Meta {
        &mut self.nodes[index.idx()]
    }

    /// Total number of nodes in the arena, root included.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root, so this is `true` only before anything
    /// below the root was scanned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }
}

/// Split a wire path into its parent folder path and final name.
///
/// `"a/b/c"` becomes `("a/b", "c")`; `"c"` becomes `("", "c")`.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", path),
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
