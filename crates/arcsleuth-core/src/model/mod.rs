/// Data model for one archive replica.
///
/// Re-exports the arena-allocated tree structure and supporting types.
pub mod archive_tree;
pub mod meta;

pub use archive_tree::{split_path, ArchiveTree, TreeError};
pub use meta::{Kind, Meta, NodeIndex, State};
