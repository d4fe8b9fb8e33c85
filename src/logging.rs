//! File logging shared by both binaries.
//!
//! stdin and stdout carry the wire protocol, so logs only ever go to a file.

use anyhow::Context;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Install the global subscriber writing to `log_file` at `level`.
///
/// Keep the returned guard alive for the whole of `main`; dropping it
/// flushes buffered lines.
pub fn init(log_file: &Path, level: &str) -> anyhow::Result<WorkerGuard> {
    let level: tracing::Level = level
        .parse()
        .with_context(|| format!("invalid log level {level:?}"))?;
    let dir = log_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_file
        .file_name()
        .with_context(|| format!("log file {} has no file name", log_file.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .init();

    Ok(guard)
}
