/// Cross-replica discrepancy detection.
///
/// Every hash bucket should hold exactly one file per archive, all under
/// the same name. A bucket that breaks either rule is divergent: each of
/// its files is marked [`State::Divergent`] and receives the bucket's
/// presence vector (copies per archive, in registration order), so every
/// replica's view shows where the content lives.
///
/// The pass is a full recompute over the index and reassigns state on
/// every file it visits, so running it again over the same index yields
/// the same annotations.
use crate::model::State;
use crate::registry::{Archive, FileRef, HashIndex};
use tracing::debug;

/// Summary of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscrepancyReport {
    /// Distinct hashes examined.
    pub buckets: usize,
    /// Hashes found divergent.
    pub divergent_buckets: usize,
    /// Files marked divergent.
    pub divergent_files: usize,
}

/// Annotate every file in `index` and re-aggregate the touched branches.
pub fn analyze(index: &HashIndex, archives: &mut [Archive]) -> DiscrepancyReport {
    let mut report = DiscrepancyReport::default();

    for (hash, bucket) in index.iter() {
        report.buckets += 1;
        if is_divergent(bucket, archives) {
            let counts = presence_vector(bucket, archives.len());
            debug!(hash, counts = ?counts, "divergent hash");
            for file in bucket {
                let node = archives[file.archive].tree.node_mut(file.node);
                node.state = State::Divergent;
                node.counts = counts.clone();
            }
            report.divergent_buckets += 1;
            report.divergent_files += bucket.len();
        } else {
            for file in bucket {
                let node = archives[file.archive].tree.node_mut(file.node);
                node.state = State::Resolved;
                node.counts.clear();
            }
        }
        for file in bucket {
            archives[file.archive].tree.recompute_upward(file.node);
        }
    }

    for archive in archives.iter_mut() {
        archive.dirty = true;
    }
    report
}

/// A bucket is divergent when its size differs from the archive count
/// (a copy is missing or duplicated) or its files do not all share a name.
pub fn is_divergent(bucket: &[FileRef], archives: &[Archive]) -> bool {
    if bucket.len() != archives.len() {
        return true;
    }
    let mut names = bucket
        .iter()
        .map(|file| archives[file.archive].tree.node(file.node).name.as_str());
    match names.next() {
        Some(first) => names.any(|name| name != first),
        None => false,
    }
}

/// Copies of the bucket's content per archive, indexed by registration order.
pub fn presence_vector(bucket: &[FileRef], archive_count: usize) -> Vec<u32> {
    let mut counts = vec![0u32; archive_count];
    for file in bucket {
        counts[file.archive] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchiveTree, Meta, NodeIndex};
    use chrono::Utc;

    fn archive_with_files(root: &str, idx: usize, names: &[&str]) -> (Archive, Vec<NodeIndex>) {
        let mut archive = Archive::new(root, idx);
        let nodes = names
            .iter()
            .map(|name| {
                let node = archive
                    .tree
                    .add_child(ArchiveTree::ROOT, Meta::new_file(*name, None, 1, Utc::now()));
                archive.tree.node_mut(node).state = State::Resolved;
                node
            })
            .collect();
        (archive, nodes)
    }

    fn annotations(archives: &[Archive]) -> Vec<(State, Vec<u32>)> {
        let mut out = Vec::new();
        for archive in archives {
            for file in archive.tree.files() {
                let node = archive.tree.node(file);
                out.push((node.state, node.counts.clone()));
            }
        }
        out
    }

    #[test]
    fn test_presence_vector_counts_per_archive() {
        let bucket = [
            FileRef {
                archive: 0,
                node: NodeIndex(1),
            },
            FileRef {
                archive: 2,
                node: NodeIndex(1),
            },
            FileRef {
                archive: 2,
                node: NodeIndex(2),
            },
        ];
        assert_eq!(presence_vector(&bucket, 3), vec![1, 0, 2]);
    }

    #[test]
    fn test_duplicate_within_one_archive_is_divergent() {
        let (a, a_nodes) = archive_with_files("a", 0, &["x", "y"]);
        let (b, b_nodes) = archive_with_files("b", 1, &["x"]);
        let mut archives = vec![a, b];
        let mut index = HashIndex::new();
        for node in a_nodes {
            index.insert("h", FileRef { archive: 0, node });
        }
        index.insert(
            "h",
            FileRef {
                archive: 1,
                node: b_nodes[0],
            },
        );

        let report = analyze(&index, &mut archives);
        assert_eq!(report.divergent_buckets, 1);
        assert_eq!(report.divergent_files, 3);
        let node = archives[1].tree.node(b_nodes[0]);
        assert_eq!(node.state, State::Divergent);
        assert_eq!(node.counts, vec![2, 1]);
        assert_eq!(archives[1].tree.root().state, State::Divergent);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let (a, a_nodes) = archive_with_files("a", 0, &["x", "lonely"]);
        let (b, b_nodes) = archive_with_files("b", 1, &["x"]);
        let mut archives = vec![a, b];
        let mut index = HashIndex::new();
        index.insert(
            "same",
            FileRef {
                archive: 0,
                node: a_nodes[0],
            },
        );
        index.insert(
            "same",
            FileRef {
                archive: 1,
                node: b_nodes[0],
            },
        );
        index.insert(
            "alone",
            FileRef {
                archive: 0,
                node: a_nodes[1],
            },
        );

        let first = analyze(&index, &mut archives);
        let snapshot = annotations(&archives);
        let second = analyze(&index, &mut archives);
        let again = annotations(&archives);

        assert_eq!(first, second);
        assert_eq!(snapshot, again);
        assert_eq!(archives[0].tree.node(a_nodes[1]).counts, vec![1, 0]);
        assert!(archives[0].tree.node(a_nodes[0]).counts.is_empty());
    }
}
