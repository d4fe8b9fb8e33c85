/// Folder frames for the UI.
///
/// A frame is `folder-begin`, one `meta` line per child in view order, then
/// `folder-end`. Layout, truncation and colour are left to the UI.
use crate::view::FolderView;
use arcsleuth_core::protocol::{presence_glyphs, Message, MetaLine};
use arcsleuth_core::registry::Archive;

/// Build the frame for the current folder of `archive`.
pub fn frame(archive: &Archive, view: &mut FolderView) -> Vec<Message> {
    let tree = &archive.tree;
    let folder = archive.current;
    let entries = view.entries(tree, folder);
    let selected = view.resolve(tree, &entries);

    let mut frame = Vec::with_capacity(entries.len() + 2);
    frame.push(Message::FolderBegin {
        root: archive.root.clone(),
        path: tree.path_string(folder),
        archive_state: archive.state,
        sort: view.sort.as_str().to_owned(),
        ascending: view.ascending(),
    });
    for (pos, &idx) in entries.iter().enumerate() {
        let node = tree.node(idx);
        frame.push(Message::Meta(MetaLine {
            kind: node.kind,
            name: node.name.to_string(),
            size: node.size,
            mod_time: node.mod_time,
            state: node.state,
            progress: node.progress,
            counts: presence_glyphs(&node.counts),
            selected: selected == Some(pos),
        }));
    }
    frame.push(Message::FolderEnd);
    frame
}
