/// Faults that end an engine run.
///
/// The loop never recovers from any of these. [`crate::Engine::run`]
/// catches the first one, logs it and tells the UI the run is over.
use crate::pipe::Source;
use arcsleuth_core::protocol::ProtocolError;
use arcsleuth_core::registry::IngestError;
use std::error::Error as StdError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed message from {origin}: {error}")]
    Malformed {
        origin: Source,
        #[source]
        error: ProtocolError,
    },

    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// A message only the engine itself may send arrived on an inbound stream.
    #[error("{kind} is not accepted from {origin}")]
    Unexpected { origin: Source, kind: &'static str },

    #[error("{0} stream closed while running")]
    StreamClosed(Source),

    #[error("inbound channel disconnected")]
    Disconnected,

    #[error("pipe I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// `err` and its `source()` chain joined with `": "`. A source whose text the
/// message so far already ends with is not repeated.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut chain = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !chain.ends_with(&text) {
            chain.push_str(": ");
            chain.push_str(&text);
        }
        source = cause.source();
    }
    chain
}
