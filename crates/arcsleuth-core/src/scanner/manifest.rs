/// CSV manifest replay.
///
/// A manifest describes an archive without touching the disk: a header
/// row followed by `id,name,size,mod-time,hash` records, where `name` is the
/// `/`-joined path and `mod-time` is RFC 3339. Replaying it produces the same
/// event sequence a real walk would, for every root that asks for it.
///
/// Records with the wrong field count, an unparsable size or time, or an
/// empty hash are skipped.
use super::{Emitter, ScannerError};
use crate::model::split_path;
use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

const FIELDS: usize = 5;

/// One file described by the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub name: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub hash: String,
}

/// Read the manifest at `path`.
pub fn load(path: &Path) -> Result<Vec<ManifestEntry>, ScannerError> {
    let file = File::open(path)?;
    read(file).map_err(|source| ScannerError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse manifest records from `reader`, sorted by name.
pub fn read<R: Read>(reader: R) -> Result<Vec<ManifestEntry>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        if record.len() != FIELDS {
            continue;
        }
        let name = &record[1];
        let Ok(size) = record[2].parse::<u64>() else {
            debug!(name, "skipping record with bad size");
            continue;
        };
        let Ok(mod_time) = DateTime::parse_from_rfc3339(&record[3]) else {
            debug!(name, "skipping record with bad mod-time");
            continue;
        };
        let hash = &record[4];
        if name.is_empty() || hash.is_empty() {
            continue;
        }
        entries.push(ManifestEntry {
            name: name.to_owned(),
            size,
            mod_time: mod_time.with_timezone(&Utc).round_subsecs(0),
            hash: hash.to_owned(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Emit the full scan/hash sequence for `entries`. Returns `false` when
/// cancelled or when the output side has gone away.
pub(crate) fn replay(
    entries: &[ManifestEntry],
    progress_step: u64,
    cancel: &AtomicBool,
    events: &Emitter<'_>,
) -> bool {
    let mut folders: HashSet<&str> = HashSet::new();
    for entry in entries {
        let (folder, _) = split_path(&entry.name);
        for ancestor in ancestors(folder) {
            if folders.insert(ancestor) && !events.folder_scanned(ancestor) {
                return false;
            }
        }
        if !events.file_scanned(&entry.name, entry.size, entry.mod_time) {
            return false;
        }
    }
    if !events.archive_scanned() {
        return false;
    }

    let step = progress_step.max(1);
    for entry in entries {
        let mut progress = 0;
        while progress < entry.size {
            if cancel.load(Ordering::Relaxed) || !events.hashing_progress(&entry.name, progress) {
                return false;
            }
            progress += step;
        }
        if cancel.load(Ordering::Relaxed) || !events.file_hashed(&entry.name, entry.hash.clone()) {
            return false;
        }
    }
    events.archive_hashed()
}

/// Every non-empty prefix of `folder`, shortest first: `"a/b"` yields
/// `"a"` then `"a/b"`.
fn ancestors(folder: &str) -> impl Iterator<Item = &str> {
    folder
        .match_indices('/')
        .map(move |(i, _)| &folder[..i])
        .chain((!folder.is_empty()).then_some(folder))
}
