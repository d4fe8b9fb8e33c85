/// Process-wide index from content hash to the file nodes that produced it.
use crate::model::NodeIndex;
use std::collections::HashMap;

/// A file node in some archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileRef {
    /// Registration index of the owning archive.
    pub archive: usize,
    pub node: NodeIndex,
}

/// Hash buckets across every archive, appended to as files are hashed.
#[derive(Debug, Default, Clone)]
pub struct HashIndex {
    buckets: HashMap<String, Vec<FileRef>>,
    files: usize,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `file` to the bucket for `hash`. Repeated deliveries for the
    /// same file are appended again; de-duplication is up to the scanner.
    pub fn insert(&mut self, hash: &str, file: FileRef) {
        self.buckets.entry(hash.to_owned()).or_default().push(file);
        self.files += 1;
    }

    pub fn bucket(&self, hash: &str) -> &[FileRef] {
        self.buckets.get(hash).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FileRef])> {
        self.buckets
            .iter()
            .map(|(hash, files)| (hash.as_str(), files.as_slice()))
    }

    /// Number of distinct hashes.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of entries across all buckets.
    pub fn file_count(&self) -> usize {
        self.files
    }
}
