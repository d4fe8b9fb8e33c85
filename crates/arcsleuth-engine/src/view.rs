/// Per-folder browse state: which entry is selected and how entries sort.
///
/// Selection is remembered by name as well as by position, so an entry
/// keeps its highlight while siblings are inserted or re-sorted around it.
/// When the named entry is gone the position is used, clamped to the list.
use arcsleuth_core::model::{ArchiveTree, Meta, NodeIndex};
use compact_str::CompactString;
use std::cmp::Ordering;

/// Column a folder listing is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    Name,
    Time,
    Size,
}

impl SortColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Time => "time",
            Self::Size => "size",
        }
    }

    /// The column selected by a UI key, if any.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "n" => Some(Self::Name),
            "t" => Some(Self::Time),
            "s" => Some(Self::Size),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderView {
    pub selected_name: Option<CompactString>,
    pub selected_idx: usize,
    pub sort: SortColumn,
    /// Direction per column, indexed by [`SortColumn`].
    ascending: [bool; 3],
}

impl Default for FolderView {
    fn default() -> Self {
        Self {
            selected_name: None,
            selected_idx: 0,
            sort: SortColumn::Name,
            // Names read A→Z; newest and largest first.
            ascending: [true, false, false],
        }
    }
}

impl FolderView {
    /// Direction of the active sort column.
    pub fn ascending(&self) -> bool {
        self.ascending[self.sort.slot()]
    }

    /// Sort by `column`; picking the active column again flips its direction.
    pub fn select_column(&mut self, column: SortColumn) {
        if self.sort == column {
            let slot = column.slot();
            self.ascending[slot] = !self.ascending[slot];
        } else {
            self.sort = column;
        }
    }

    /// Children of `folder` in display order.
    pub fn entries(&self, tree: &ArchiveTree, folder: NodeIndex) -> Vec<NodeIndex> {
        let mut entries: Vec<NodeIndex> = tree.children(folder).collect();
        entries.sort_by(|&a, &b| self.compare(tree.node(a), tree.node(b)));
        entries
    }

    fn compare(&self, a: &Meta, b: &Meta) -> Ordering {
        let ord = match self.sort {
            SortColumn::Name => compare_names(a, b)
                .then(a.size.cmp(&b.size))
                .then(a.mod_time.cmp(&b.mod_time)),
            SortColumn::Time => a
                .mod_time
                .cmp(&b.mod_time)
                .then_with(|| compare_names(a, b))
                .then(a.size.cmp(&b.size)),
            SortColumn::Size => a
                .size
                .cmp(&b.size)
                .then_with(|| compare_names(a, b))
                .then(a.mod_time.cmp(&b.mod_time)),
        };
        if self.ascending() {
            ord
        } else {
            ord.reverse()
        }
    }

    /// Position of the selected entry within `entries`, re-synced by name.
    /// `None` only for an empty folder.
    pub fn resolve(&mut self, tree: &ArchiveTree, entries: &[NodeIndex]) -> Option<usize> {
        if entries.is_empty() {
            self.selected_idx = 0;
            return None;
        }
        if let Some(name) = &self.selected_name {
            if let Some(pos) = entries.iter().position(|&e| tree.node(e).name == *name) {
                self.selected_idx = pos;
                return Some(pos);
            }
        }
        let idx = self.selected_idx.min(entries.len() - 1);
        self.select(tree, entries, idx);
        Some(idx)
    }

    /// The selected node, if the folder has any entries.
    pub fn selected(&mut self, tree: &ArchiveTree, entries: &[NodeIndex]) -> Option<NodeIndex> {
        self.resolve(tree, entries).map(|idx| entries[idx])
    }

    /// Move the selection by `delta` rows, stopping at either end.
    pub fn move_by(&mut self, tree: &ArchiveTree, entries: &[NodeIndex], delta: isize) {
        if let Some(current) = self.resolve(tree, entries) {
            let target = current.saturating_add_signed(delta);
            self.move_to(tree, entries, target);
        }
    }

    /// Select row `idx`, clamped to the last entry.
    pub fn move_to(&mut self, tree: &ArchiveTree, entries: &[NodeIndex], idx: usize) {
        if let Some(last) = entries.len().checked_sub(1) {
            self.select(tree, entries, idx.min(last));
        }
    }

    /// Select the entry called `name` the next time this view resolves.
    pub fn select_name(&mut self, name: CompactString) {
        self.selected_name = Some(name);
    }

    fn select(&mut self, tree: &ArchiveTree, entries: &[NodeIndex], idx: usize) {
        self.selected_idx = idx;
        self.selected_name = Some(tree.node(entries[idx]).name.clone());
    }
}

/// Case-insensitive, with the exact name as tie-breaker so the order is total.
fn compare_names(a: &Meta, b: &Meta) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tree() -> ArchiveTree {
        let mut tree = ArchiveTree::new();
        for (name, size, secs) in [("b", 30, 1), ("A", 10, 3), ("c", 20, 2)] {
            let meta = Meta::new_file(name, None, size, Utc.timestamp_opt(secs, 0).unwrap());
            let idx = tree.add_child(ArchiveTree::ROOT, meta);
            tree.recompute_upward(idx);
        }
        tree
    }

    fn names(tree: &ArchiveTree, view: &FolderView) -> Vec<String> {
        view.entries(tree, ArchiveTree::ROOT)
            .into_iter()
            .map(|idx| tree.node(idx).name.to_string())
            .collect()
    }

    #[test]
    fn test_sort_orders() {
        let tree = tree();
        let mut view = FolderView::default();
        assert_eq!(names(&tree, &view), vec!["A", "b", "c"]);

        view.select_column(SortColumn::Size);
        assert_eq!(names(&tree, &view), vec!["b", "c", "A"]);

        view.select_column(SortColumn::Time);
        assert_eq!(names(&tree, &view), vec!["A", "c", "b"]);

        view.select_column(SortColumn::Time);
        assert!(view.ascending());
        assert_eq!(names(&tree, &view), vec!["b", "c", "A"]);
    }

    #[test]
    fn test_selection_follows_name_across_resort() {
        let tree = tree();
        let mut view = FolderView::default();
        let entries = view.entries(&tree, ArchiveTree::ROOT);
        view.move_by(&tree, &entries, 1);
        assert_eq!(view.selected_name.as_deref(), Some("b"));

        view.select_column(SortColumn::Size);
        let entries = view.entries(&tree, ArchiveTree::ROOT);
        assert_eq!(view.resolve(&tree, &entries), Some(0));
    }

    #[test]
    fn test_movement_is_clamped() {
        let tree = tree();
        let mut view = FolderView::default();
        let entries = view.entries(&tree, ArchiveTree::ROOT);
        view.move_by(&tree, &entries, -5);
        assert_eq!(view.selected_idx, 0);
        view.move_by(&tree, &entries, 50);
        assert_eq!(view.selected_idx, 2);
        view.move_to(&tree, &entries, 0);
        assert_eq!(view.selected_name.as_deref(), Some("A"));
    }

    #[test]
    fn test_empty_folder_has_no_selection() {
        let tree = ArchiveTree::new();
        let mut view = FolderView::default();
        let entries = view.entries(&tree, ArchiveTree::ROOT);
        assert_eq!(view.selected(&tree, &entries), None);
        view.move_by(&tree, &entries, 1);
        assert_eq!(view.selected_idx, 0);
    }
}
