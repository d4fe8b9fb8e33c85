/// Directory walk for one root using `jwalk`.
///
/// Entries are sorted per directory and yielded depth-first, so every
/// `folder-scanned` precedes the events for its contents. Symlinks are not
/// followed and hidden entries are included. Unreadable entries, and entries
/// whose path holds a tab or line break, are logged and skipped; a partial
/// archive is still a usable archive.
use super::hasher::HashJob;
use super::Emitter;
use crate::protocol::is_wire_safe;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Walk `root`, emitting scan events, and return the files to hash.
///
/// Returns `None` when cancelled or when the output side has gone away.
pub(crate) fn walk(root: &Path, cancel: &AtomicBool, events: &Emitter<'_>) -> Option<Vec<HashJob>> {
    let walker = jwalk::WalkDir::new(root)
        .sort(true)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()));

    let mut jobs = Vec::new();
    let mut folders = 0usize;

    for entry_result in walker {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }

        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                warn!(%err, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if path == root {
            continue;
        }
        let Some(rel_path) = relative_path(root, &path) else {
            continue;
        };
        if !is_wire_safe(&rel_path) {
            warn!(path = ?rel_path, "skipping entry with tab or line break in its path");
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_dir() {
            folders += 1;
            if !events.folder_scanned(&rel_path) {
                return None;
            }
        } else if file_type.is_file() {
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping file without metadata");
                    continue;
                }
            };
            let size = meta.len();
            let mod_time = DateTime::<Utc>::from(meta.modified().unwrap_or(UNIX_EPOCH));
            if !events.file_scanned(&rel_path, size, mod_time) {
                return None;
            }
            jobs.push(HashJob {
                rel_path,
                abs_path: path,
                size,
            });
        }
    }

    debug!(root = %root.display(), folders, files = jobs.len(), "walk finished");
    Some(jobs)
}

/// `/`-joined path of `path` below `root`, or `None` outside of it.
pub(crate) fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let names: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if names.is_empty() {
        return None;
    }
    Some(names.join("/"))
}
