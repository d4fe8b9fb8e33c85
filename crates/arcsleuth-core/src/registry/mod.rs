/// Archive registry and scanner-event ingestion.
///
/// The registry owns one tree per root, in registration order, plus the
/// process-wide [`HashIndex`]. Each scanner event maps to one method that
/// grows or updates a tree and re-aggregates the touched branch. When the
/// last archive finishes hashing, discrepancy analysis runs over the index.
///
/// Only the engine loop calls into the registry, so nothing here locks.
pub mod archive;
pub mod hash_index;

pub use archive::{Archive, ArchiveState};
pub use hash_index::{FileRef, HashIndex};

use crate::analysis::discrepancy::{self, DiscrepancyReport};
use crate::model::{split_path, Kind, Meta, NodeIndex, State, TreeError};
use crate::protocol::Message;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Faults raised while applying an event. All are fatal for the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("event for unregistered root {0:?}")]
    UnknownRoot(String),

    #[error("root {root:?} has no file at {path:?}")]
    UnknownPath { root: String, path: String },

    #[error("root {root:?}: {source}")]
    Tree {
        root: String,
        #[source]
        source: TreeError,
    },

    /// Reconciliation events are named in the protocol but have no handler.
    #[error("{0} is not implemented")]
    Unimplemented(&'static str),
}

/// What applying one message changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Nothing in the registry: UI, lifecycle or frame messages, or a
    /// duplicate `scan`.
    Ignored,
    /// A new archive was registered at this index.
    Registered(usize),
    /// The archive at this index changed.
    Updated(usize),
    /// The last archive finished hashing and discrepancy analysis ran.
    Analyzed(DiscrepancyReport),
}

/// All archives of the run plus the cross-archive hash index.
#[derive(Debug, Default)]
pub struct Registry {
    archives: Vec<Archive>,
    by_root: HashMap<String, usize>,
    hash_index: HashIndex,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decoded message.
    pub fn apply(&mut self, msg: &Message) -> Result<Applied, IngestError> {
        match msg {
            Message::Scan { root } => Ok(self
                .register(root)
                .map_or(Applied::Ignored, Applied::Registered)),
            Message::FolderScanned { root, path } => {
                self.folder_scanned(root, path)?;
                self.updated(root)
            }
            Message::FileScanned {
                root,
                path,
                size,
                mod_time,
            } => {
                self.file_scanned(root, path, *size, *mod_time)?;
                self.updated(root)
            }
            Message::ArchiveScanned { root } => {
                self.archive_scanned(root)?;
                self.updated(root)
            }
            Message::HashingProgress {
                root,
                path,
                progress,
            } => {
                self.hashing_progress(root, path, *progress)?;
                self.updated(root)
            }
            Message::FileHashed { root, path, hash } => {
                self.file_hashed(root, path, hash)?;
                self.updated(root)
            }
            Message::ArchiveHashed { root } => match self.archive_hashed(root)? {
                Some(report) => Ok(Applied::Analyzed(report)),
                None => self.updated(root),
            },
            Message::FileCopied { .. } | Message::FileMoved { .. } | Message::FileDeleted { .. } => {
                Err(IngestError::Unimplemented(msg.kind()))
            }
            Message::SetCurrentFolder { .. }
            | Message::Key { .. }
            | Message::Ready
            | Message::ScreenSize { .. }
            | Message::Stop
            | Message::Stopped
            | Message::FolderBegin { .. }
            | Message::Meta(_)
            | Message::FolderEnd => Ok(Applied::Ignored),
        }
    }

    fn updated(&self, root: &str) -> Result<Applied, IngestError> {
        self.index_of(root).map(Applied::Updated)
    }

    /// `scan(root)`: create the archive and return its registration index.
    ///
    /// Returns `None` if the root is already registered; archives are created
    /// once per run and the caller must not forward the duplicate.
    pub fn register(&mut self, root: &str) -> Option<usize> {
        if self.by_root.contains_key(root) {
            warn!(root, "root already registered, ignoring scan");
            return None;
        }
        let idx = self.archives.len();
        self.archives.push(Archive::new(root, idx));
        self.by_root.insert(root.to_owned(), idx);
        info!(root, idx, "archive registered");
        Some(idx)
    }

    /// `folder-scanned(root, path)`: create every missing folder along `path`.
    pub fn folder_scanned(&mut self, root: &str, path: &str) -> Result<(), IngestError> {
        let archive = self.archive_for(root)?;
        archive
            .tree
            .ensure_folder(path)
            .map_err(|source| IngestError::Tree {
                root: root.to_owned(),
                source,
            })?;
        archive.dirty = true;
        Ok(())
    }

    /// `file-scanned(root, path, size, mod_time)`: insert a `Scanned` file and
    /// re-aggregate its ancestors.
    pub fn file_scanned(
        &mut self,
        root: &str,
        path: &str,
        size: u64,
        mod_time: DateTime<Utc>,
    ) -> Result<(), IngestError> {
        let archive = self.archive_for(root)?;
        let (folder_path, name) = split_path(path);
        if name.is_empty() {
            return Err(IngestError::UnknownPath {
                root: root.to_owned(),
                path: path.to_owned(),
            });
        }
        let folder = archive
            .tree
            .ensure_folder(folder_path)
            .map_err(|source| IngestError::Tree {
                root: root.to_owned(),
                source,
            })?;
        let file = archive
            .tree
            .add_child(folder, Meta::new_file(name, None, size, mod_time));
        archive.tree.recompute_upward(file);
        archive.dirty = true;
        Ok(())
    }

    /// `archive-scanned(root)`: the walk is complete, hashing starts.
    pub fn archive_scanned(&mut self, root: &str) -> Result<(), IngestError> {
        let archive = self.archive_for(root)?;
        if archive.state != ArchiveState::Scanning {
            warn!(root, state = %archive.state, "archive-scanned outside scanning state");
        }
        archive.state = ArchiveState::Hashing;
        archive.dirty = true;
        info!(root, files = archive.tree.root().file_count, "archive scanned");
        Ok(())
    }

    /// `hashing-progress(root, path, progress)`: record bytes hashed so far.
    pub fn hashing_progress(
        &mut self,
        root: &str,
        path: &str,
        progress: u64,
    ) -> Result<(), IngestError> {
        let archive = self.archive_for(root)?;
        let file = find_file(archive, path)?;
        let node = archive.tree.node_mut(file);
        node.progress = progress.min(node.size);
        node.state = State::Hashing;
        archive.tree.recompute_upward(file);
        archive.dirty = true;
        Ok(())
    }

    /// `file-hashed(root, path, hash)`: resolve the file and index its hash.
    pub fn file_hashed(&mut self, root: &str, path: &str, hash: &str) -> Result<(), IngestError> {
        let archive_idx = self.index_of(root)?;
        let archive = &mut self.archives[archive_idx];
        let file = find_file(archive, path)?;
        let node = archive.tree.node_mut(file);
        node.hash = Some(hash.to_owned());
        node.state = State::Resolved;
        node.progress = node.size;
        archive.tree.recompute_upward(file);
        archive.dirty = true;

        self.hash_index.insert(
            hash,
            FileRef {
                archive: archive_idx,
                node: file,
            },
        );
        debug!(root, path, hash, "file hashed");
        Ok(())
    }

    /// `archive-hashed(root)`: the archive is ready. Once no archive is still
    /// scanning or hashing, runs discrepancy analysis and returns its report.
    pub fn archive_hashed(&mut self, root: &str) -> Result<Option<DiscrepancyReport>, IngestError> {
        let archive = self.archive_for(root)?;
        archive.state = ArchiveState::Ready;
        archive.dirty = true;
        info!(root, "archive hashed");

        if !self.all_settled() {
            return Ok(None);
        }
        Ok(Some(self.analyze_discrepancies()))
    }

    /// Run the detector over the whole hash index. Safe to repeat.
    pub fn analyze_discrepancies(&mut self) -> DiscrepancyReport {
        let report = discrepancy::analyze(&self.hash_index, &mut self.archives);
        info!(
            buckets = report.buckets,
            divergent_buckets = report.divergent_buckets,
            divergent_files = report.divergent_files,
            "discrepancy analysis complete"
        );
        report
    }

    /// `true` when every registered archive is past hashing.
    pub fn all_settled(&self) -> bool {
        self.archives.iter().all(|a| a.state.is_settled())
    }

    /// Registration index of `root`.
    pub fn index_of(&self, root: &str) -> Result<usize, IngestError> {
        self.by_root
            .get(root)
            .copied()
            .ok_or_else(|| IngestError::UnknownRoot(root.to_owned()))
    }

    fn archive_for(&mut self, root: &str) -> Result<&mut Archive, IngestError> {
        let idx = self.index_of(root)?;
        Ok(&mut self.archives[idx])
    }

    /// Archives in registration order.
    pub fn archives(&self) -> &[Archive] {
        &self.archives
    }

    #[inline]
    pub fn archive(&self, idx: usize) -> &Archive {
        &self.archives[idx]
    }

    #[inline]
    pub fn archive_mut(&mut self, idx: usize) -> &mut Archive {
        &mut self.archives[idx]
    }

    pub fn hash_index(&self) -> &HashIndex {
        &self.hash_index
    }

    /// Number of registered archives.
    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}

/// Resolve `path` to a file node of `archive`.
fn find_file(archive: &Archive, path: &str) -> Result<NodeIndex, IngestError> {
    archive
        .tree
        .lookup(path)
        .filter(|&idx| archive.tree.node(idx).kind == Kind::File)
        .ok_or_else(|| IngestError::UnknownPath {
            root: archive.root.clone(),
            path: path.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_register_once() {
        let mut registry = Registry::new();
        assert_eq!(registry.register("origin"), Some(0));
        assert_eq!(registry.register("copy"), Some(1));
        assert_eq!(registry.register("origin"), None);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.archive(1).root, "copy");
    }

    #[test]
    fn test_unknown_root_is_rejected() {
        let mut registry = Registry::new();
        assert_eq!(
            registry.folder_scanned("nowhere", "a"),
            Err(IngestError::UnknownRoot("nowhere".into()))
        );
    }

    #[test]
    fn test_file_lifecycle_updates_ancestors() {
        let mut registry = Registry::new();
        registry.register("r");
        registry.folder_scanned("r", "a").unwrap();
        registry.file_scanned("r", "a/f", 100, t(5)).unwrap();
        registry.archive_scanned("r").unwrap();

        let tree = &registry.archive(0).tree;
        let folder = tree.lookup("a").unwrap();
        assert_eq!(tree.node(folder).state, State::Scanned);
        assert_eq!(tree.root().size, 100);

        registry.hashing_progress("r", "a/f", 40).unwrap();
        let tree = &registry.archive(0).tree;
        assert_eq!(tree.node(folder).state, State::Hashing);
        assert_eq!(tree.root().progress, 40);

        registry.file_hashed("r", "a/f", "abcd").unwrap();
        let tree = &registry.archive(0).tree;
        assert_eq!(tree.root().state, State::Resolved);
        assert_eq!(tree.root().progress, 100);
        assert_eq!(registry.hash_index().bucket("abcd").len(), 1);
    }

    #[test]
    fn test_progress_is_clamped_to_size() {
        let mut registry = Registry::new();
        registry.register("r");
        registry.file_scanned("r", "f", 10, t(0)).unwrap();
        registry.hashing_progress("r", "f", 999).unwrap();
        let tree = &registry.archive(0).tree;
        assert_eq!(tree.node(tree.lookup("f").unwrap()).progress, 10);
    }

    #[test]
    fn test_hash_for_missing_file_fails() {
        let mut registry = Registry::new();
        registry.register("r");
        registry.folder_scanned("r", "dir").unwrap();
        assert_eq!(
            registry.file_hashed("r", "dir", "00"),
            Err(IngestError::UnknownPath {
                root: "r".into(),
                path: "dir".into()
            })
        );
    }

    #[test]
    fn test_analysis_waits_for_every_archive() {
        let mut registry = Registry::new();
        registry.register("a");
        registry.register("b");
        registry.archive_scanned("a").unwrap();
        assert_eq!(registry.archive_hashed("a").unwrap(), None);
        registry.archive_scanned("b").unwrap();
        assert!(registry.archive_hashed("b").unwrap().is_some());
    }

    #[test]
    fn test_apply_dispatches_messages() {
        let mut registry = Registry::new();
        let scan = Message::Scan { root: "r".into() };
        assert_eq!(registry.apply(&scan), Ok(Applied::Registered(0)));
        assert_eq!(registry.apply(&scan), Ok(Applied::Ignored));

        let scanned = Message::FileScanned {
            root: "r".into(),
            path: "a/f".into(),
            size: 3,
            mod_time: t(1),
        };
        assert_eq!(registry.apply(&scanned), Ok(Applied::Updated(0)));
        assert_eq!(registry.apply(&Message::Ready), Ok(Applied::Ignored));

        registry
            .apply(&Message::ArchiveScanned { root: "r".into() })
            .unwrap();
        let hashed = Message::ArchiveHashed { root: "r".into() };
        assert!(matches!(registry.apply(&hashed), Ok(Applied::Analyzed(_))));
    }

    #[test]
    fn test_reserved_events_are_unimplemented() {
        let mut registry = Registry::new();
        registry.register("r");
        let deleted = Message::FileDeleted {
            root: "r".into(),
            path: "f".into(),
        };
        assert_eq!(
            registry.apply(&deleted),
            Err(IngestError::Unimplemented("file-deleted"))
        );
    }

    #[test]
    fn test_mutations_mark_archive_dirty() {
        let mut registry = Registry::new();
        registry.register("r");
        registry.archive_mut(0).dirty = false;
        registry.file_scanned("r", "f", 1, t(0)).unwrap();
        assert!(registry.archive(0).dirty);
    }

    #[test]
    fn test_file_scanned_without_name_is_rejected() {
        let mut registry = Registry::new();
        registry.register("r");
        for path in ["", "dir/"] {
            assert_eq!(
                registry.file_scanned("r", path, 1, t(0)),
                Err(IngestError::UnknownPath {
                    root: "r".to_owned(),
                    path: path.to_owned(),
                })
            );
        }
        assert_eq!(registry.archive(0).tree.root().file_count, 0);
        assert!(registry.archive(0).tree.lookup("dir").is_none());
    }
}
