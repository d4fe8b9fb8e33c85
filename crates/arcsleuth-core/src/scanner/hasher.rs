/// Content hashing with `blake3`.
///
/// Files are read through one reusable buffer per worker. A
/// `hashing-progress` event goes out before the first read and then every
/// `progress_step` bytes, so the engine can show a file as in-flight.
use super::Emitter;
use crate::config::ScannerConfig;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// One file found by the walk, waiting to be hashed.
#[derive(Debug, Clone)]
pub struct HashJob {
    /// Wire path relative to the archive root.
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
}

/// Hash every job in order. Returns `false` when cancelled or when the
/// output side has gone away.
pub(crate) fn hash_all(
    jobs: &[HashJob],
    config: &ScannerConfig,
    cancel: &AtomicBool,
    events: &Emitter<'_>,
) -> bool {
    let mut buffer = vec![0u8; config.read_buffer.max(4096)];
    for job in jobs {
        if !events.hashing_progress(&job.rel_path, 0) {
            return false;
        }
        let result = hash_file(&job.abs_path, &mut buffer, config.progress_step, cancel, |done| {
            events.hashing_progress(&job.rel_path, done)
        });
        match result {
            Ok(Some(hash)) => {
                if !events.file_hashed(&job.rel_path, hash) {
                    return false;
                }
            }
            Ok(None) => return false,
            // The file stays `scanned` in the engine; the rest of the archive
            // still completes.
            Err(err) => warn!(path = %job.abs_path.display(), %err, "failed to hash file"),
        }
    }
    true
}

/// Hash the file at `path`, calling `on_progress` with the running byte
/// count every `progress_step` bytes.
///
/// Returns `Ok(None)` if `cancel` is raised or `on_progress` returns `false`.
pub fn hash_file(
    path: &Path,
    buffer: &mut [u8],
    progress_step: u64,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(u64) -> bool,
) -> io::Result<Option<String>> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut hashed = 0u64;
    let mut reported = 0u64;

    loop {
        if cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let n = match file.read(buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buffer[..n]);
        hashed += n as u64;

        if progress_step > 0 && hashed - reported >= progress_step {
            reported = hashed;
            if !on_progress(hashed) {
                return Ok(None);
            }
        }
    }

    Ok(Some(hasher.finalize().to_hex().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_matches_blake3_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let content = vec![7u8; 10_000];
        std::fs::write(&path, &content).unwrap();

        let mut buffer = vec![0u8; 1024];
        let mut reports = Vec::new();
        let hash = hash_file(&path, &mut buffer, 4096, &AtomicBool::new(false), |done| {
            reports.push(done);
            true
        })
        .unwrap();

        assert_eq!(hash, Some(blake3::hash(&content).to_hex().to_string()));
        assert_eq!(reports, vec![4096, 8192]);
    }

    #[test]
    fn test_cancelled_hash_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"payload").unwrap();

        let mut buffer = vec![0u8; 16];
        let hash = hash_file(&path, &mut buffer, 1, &AtomicBool::new(true), |_| true).unwrap();
        assert_eq!(hash, None);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut buffer = vec![0u8; 16];
        let result = hash_file(
            &dir.path().join("missing"),
            &mut buffer,
            1,
            &AtomicBool::new(false),
            |_| true,
        );
        assert!(result.is_err());
    }
}
