/// Line-oriented plumbing between the engine and its peer processes.
///
/// Each inbound byte stream gets its own named reader thread that decodes
/// newline-terminated lines and pushes them onto the shared channel, tagged
/// with where they came from. Outbound streams are buffered and flushed by
/// the loop once per iteration.
use arcsleuth_core::protocol::{Message, ProtocolError};
use crossbeam_channel::Sender;
use std::fmt;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// The peer an inbound message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Scanner,
    Ui,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scanner => "scanner",
            Self::Ui => "ui",
        })
    }
}

/// Everything a reader thread can hand to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Message(Source, Message),
    /// A line that did not decode. Fatal while the engine is running.
    Malformed(Source, ProtocolError),
    /// End of stream. Sent once, as the reader's last message.
    Closed(Source),
}

/// Start a reader thread for `source`.
///
/// The thread exits after end of stream, a read error, or once the engine
/// has dropped the receiving side.
pub fn spawn_reader<R>(source: Source, reader: R, tx: Sender<Inbound>) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("arcsleuth-{source}-reader"))
        .spawn(move || read_lines(source, reader, &tx))
}

fn read_lines<R: Read>(source: Source, reader: R, tx: &Sender<Inbound>) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut lines = 0u64;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(%source, %err, "read failed, treating as end of stream");
                break;
            }
        }

        let inbound = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match Message::decode(line) {
                Ok(msg) => Inbound::Message(source, msg),
                Err(err) => Inbound::Malformed(source, err),
            },
            Err(_) => Inbound::Malformed(source, ProtocolError::InvalidUtf8),
        };
        lines += 1;
        if tx.send(inbound).is_err() {
            debug!(%source, "engine gone, reader exiting");
            return;
        }
    }

    debug!(%source, lines, "stream closed");
    let _ = tx.send(Inbound::Closed(source));
}

/// Buffered, line-at-a-time writer for one outbound stream.
pub struct Outbox<W: Write> {
    writer: BufWriter<W>,
    sent: u64,
}

impl<W: Write> Outbox<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            sent: 0,
        }
    }

    /// Queue one message as a wire line.
    pub fn send(&mut self, msg: &Message) -> io::Result<()> {
        writeln!(self.writer, "{msg}")?;
        self.sent += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    /// Messages queued so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// The underlying writer. Only holds what has been flushed.
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|err| err.into_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(source: Source, input: &'static [u8]) -> Vec<Inbound> {
        let (tx, rx) = crossbeam_channel::unbounded();
        spawn_reader(source, Cursor::new(input), tx)
            .unwrap()
            .join()
            .unwrap();
        rx.try_iter().collect()
    }

    #[test]
    fn test_reader_decodes_lines_and_reports_close() {
        let inbound = collect(Source::Scanner, b"archive-scanned\troot=r\n\nready\n");
        assert_eq!(
            inbound,
            vec![
                Inbound::Message(
                    Source::Scanner,
                    Message::ArchiveScanned { root: "r".into() }
                ),
                Inbound::Message(Source::Scanner, Message::Ready),
                Inbound::Closed(Source::Scanner),
            ]
        );
    }

    #[test]
    fn test_reader_accepts_last_line_without_newline() {
        let inbound = collect(Source::Ui, b"stop");
        assert_eq!(inbound[0], Inbound::Message(Source::Ui, Message::Stop));
        assert_eq!(inbound[1], Inbound::Closed(Source::Ui));
    }

    #[test]
    fn test_reader_reports_malformed_lines() {
        let inbound = collect(Source::Ui, b"bogus\n\xff\xfe\n");
        assert_eq!(
            inbound[0],
            Inbound::Malformed(Source::Ui, ProtocolError::UnknownType("bogus".into()))
        );
        assert_eq!(
            inbound[1],
            Inbound::Malformed(Source::Ui, ProtocolError::InvalidUtf8)
        );
    }

    #[test]
    fn test_outbox_writes_lines() {
        let mut outbox = Outbox::new(Vec::new());
        outbox.send(&Message::Stop).unwrap();
        outbox.send(&Message::Stopped).unwrap();
        assert_eq!(outbox.sent(), 2);
        let bytes = outbox.into_inner().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "stop\nstopped\n");
    }
}
