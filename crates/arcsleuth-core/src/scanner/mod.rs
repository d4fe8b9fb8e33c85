/// Scanner module: the filesystem scanner/hasher process.
///
/// Reads `scan{root}` / `stop{}` commands line by line and answers with
/// the scan/hash event stream for each root:
///
/// 1. `folder-scanned` / `file-scanned` for the whole tree (depth-first),
/// 2. one `archive-scanned`,
/// 3. `hashing-progress` / `file-hashed` for every file,
/// 4. one `archive-hashed`.
///
/// Each root is scanned on its own named thread. All output goes through
/// one channel to a single writer thread, so lines from different roots
/// never interleave mid-line. `stop` (or end of input) raises a shared
/// cancel flag; once every worker has returned exactly one `stopped` is
/// written.
///
/// Two sources are supported: a real `jwalk` walk with `blake3` hashing
/// ([`walker`], [`hasher`]), and replay of a CSV manifest ([`manifest`]) so
/// the engine can be exercised without touching the disk.
pub mod hasher;
pub mod manifest;
pub mod walker;

use crate::config::ScannerConfig;
use crate::protocol::{is_wire_safe, Message};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use manifest::ManifestEntry;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("scanner I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("failed to read manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Where scan events come from.
#[derive(Debug, Clone)]
pub enum ScanSource {
    /// Walk and hash the real directory named by the root.
    Walk,
    /// Replay the same manifest for every root.
    Manifest(Arc<Vec<ManifestEntry>>),
}

impl ScanSource {
    /// Pick the source configured in `config`, loading the manifest if any.
    pub fn from_config(config: &ScannerConfig) -> Result<Self, ScannerError> {
        match &config.manifest {
            Some(path) => {
                let entries = manifest::load(path)?;
                info!(path = %path.display(), entries = entries.len(), "replaying manifest");
                Ok(Self::Manifest(Arc::new(entries)))
            }
            None => Ok(Self::Walk),
        }
    }
}

/// Serve scanner commands from `input` until `stop` or end of input,
/// writing events to `output`.
pub fn serve<R, W>(config: &ScannerConfig, input: R, output: W) -> Result<(), ScannerError>
where
    R: BufRead,
    W: Write + Send + 'static,
{
    let source = ScanSource::from_config(config)?;
    let (tx, rx) = crossbeam_channel::unbounded::<Message>();
    let writer = thread::Builder::new()
        .name("arcsleuth-fs-writer".into())
        .spawn(move || write_events(rx, output))?;

    let cancel = Arc::new(AtomicBool::new(false));
    let mut workers = Vec::new();

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match Message::decode(&line) {
            Ok(Message::Scan { root }) if !is_wire_safe(&root) => {
                warn!(root = ?root, "ignoring root with tab or line break");
            }
            Ok(Message::Scan { root }) => {
                info!(root = %root, "scan requested");
                let source = source.clone();
                let config = config.clone();
                let cancel = Arc::clone(&cancel);
                let tx = tx.clone();
                let worker = thread::Builder::new()
                    .name(format!("arcsleuth-scan-{}", workers.len()))
                    .spawn(move || scan_root(&root, &source, &config, &cancel, &tx))?;
                workers.push(worker);
            }
            Ok(Message::Stop) => {
                info!("stop requested");
                break;
            }
            Ok(other) => warn!(kind = other.kind(), "ignoring unexpected command"),
            Err(err) => warn!(%err, "ignoring undecodable command"),
        }
    }

    cancel.store(true, Ordering::Relaxed);
    for worker in workers {
        if worker.join().is_err() {
            warn!("scan worker panicked");
        }
    }

    // The writer may already be gone if the engine closed its end.
    let _ = tx.send(Message::Stopped);
    drop(tx);
    match writer.join() {
        Ok(result) => result?,
        Err(_) => warn!("writer thread panicked"),
    }
    info!("scanner stopped");
    Ok(())
}

fn write_events<W: Write>(rx: Receiver<Message>, mut output: W) -> io::Result<()> {
    for msg in rx {
        writeln!(output, "{msg}")?;
        output.flush()?;
    }
    Ok(())
}

/// Produce the full event sequence for one root.
fn scan_root(
    root: &str,
    source: &ScanSource,
    config: &ScannerConfig,
    cancel: &AtomicBool,
    tx: &Sender<Message>,
) {
    let events = Emitter { root, tx };
    let completed = match source {
        ScanSource::Walk => walk_and_hash(Path::new(root), config, cancel, &events),
        ScanSource::Manifest(entries) => {
            manifest::replay(entries, config.progress_step, cancel, &events)
        }
    };
    if completed {
        info!(root, "archive complete");
    } else {
        debug!(root, "scan abandoned");
    }
}

fn walk_and_hash(
    root: &Path,
    config: &ScannerConfig,
    cancel: &AtomicBool,
    events: &Emitter<'_>,
) -> bool {
    let Some(jobs) = walker::walk(root, cancel, events) else {
        return false;
    };
    if !events.archive_scanned() {
        return false;
    }
    hasher::hash_all(&jobs, config, cancel, events) && events.archive_hashed()
}

/// Sends the events of one root. Every method returns `false` once the
/// writer side is gone, which tells the worker to give up.
pub(crate) struct Emitter<'a> {
    root: &'a str,
    tx: &'a Sender<Message>,
}

impl Emitter<'_> {
    fn send(&self, msg: Message) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub(crate) fn folder_scanned(&self, path: &str) -> bool {
        self.send(Message::FolderScanned {
            root: self.root.to_owned(),
            path: path.to_owned(),
        })
    }

    pub(crate) fn file_scanned(&self, path: &str, size: u64, mod_time: DateTime<Utc>) -> bool {
        self.send(Message::FileScanned {
            root: self.root.to_owned(),
            path: path.to_owned(),
            size,
            mod_time,
        })
    }

    pub(crate) fn archive_scanned(&self) -> bool {
        self.send(Message::ArchiveScanned {
            root: self.root.to_owned(),
        })
    }

    pub(crate) fn hashing_progress(&self, path: &str, progress: u64) -> bool {
        self.send(Message::HashingProgress {
            root: self.root.to_owned(),
            path: path.to_owned(),
            progress,
        })
    }

    pub(crate) fn file_hashed(&self, path: &str, hash: String) -> bool {
        self.send(Message::FileHashed {
            root: self.root.to_owned(),
            path: path.to_owned(),
            hash,
        })
    }

    pub(crate) fn archive_hashed(&self) -> bool {
        self.send(Message::ArchiveHashed {
            root: self.root.to_owned(),
        })
    }
}
