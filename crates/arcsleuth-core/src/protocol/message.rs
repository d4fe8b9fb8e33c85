/// The closed set of wire messages, decoded once at the process boundary.
///
/// Decoding turns the stringly-typed line into a [`Message`] variant with
/// typed fields; after that every consumer matches exhaustively. Encoding
/// is the `Display` impl and produces the line without its trailing `\n`.
use super::error::ProtocolError;
use crate::model::{Kind, State};
use crate::registry::ArchiveState;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

/// One child row of a rendered folder frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaLine {
    pub kind: Kind,
    pub name: String,
    pub size: u64,
    pub mod_time: Option<DateTime<Utc>>,
    pub state: State,
    pub progress: u64,
    /// Presence vector rendered with [`presence_glyphs`], empty when absent.
    pub counts: String,
    pub selected: bool,
}

/// Every message that travels between the engine, the scanner and the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // ── Scanner commands and events ──────────────────────
    Scan {
        root: String,
    },
    FolderScanned {
        root: String,
        path: String,
    },
    FileScanned {
        root: String,
        path: String,
        size: u64,
        mod_time: DateTime<Utc>,
    },
    ArchiveScanned {
        root: String,
    },
    HashingProgress {
        root: String,
        path: String,
        progress: u64,
    },
    FileHashed {
        root: String,
        path: String,
        hash: String,
    },
    ArchiveHashed {
        root: String,
    },

    // ── Reserved reconciliation events ───────────────────
    FileCopied {
        root: String,
        path: String,
        /// Destination roots, `:`-separated on the wire.
        to: Vec<String>,
    },
    FileMoved {
        root: String,
        from_path: String,
        to_path: String,
    },
    FileDeleted {
        root: String,
        path: String,
    },

    // ── UI events ────────────────────────────────────────
    SetCurrentFolder {
        root: String,
        path: String,
    },
    Key {
        name: String,
    },
    /// The UI finished presenting a frame and can take the next one.
    Ready,
    ScreenSize {
        width: u16,
        height: u16,
    },

    // ── Lifecycle ────────────────────────────────────────
    Stop,
    Stopped,

    // ── Engine → UI frame ────────────────────────────────
    FolderBegin {
        root: String,
        path: String,
        archive_state: ArchiveState,
        sort: String,
        ascending: bool,
    },
    Meta(MetaLine),
    FolderEnd,
}

impl Message {
    /// The wire type name.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scan { .. } => "scan",
            Self::FolderScanned { .. } => "folder-scanned",
            Self::FileScanned { .. } => "file-scanned",
            Self::ArchiveScanned { .. } => "archive-scanned",
            Self::HashingProgress { .. } => "hashing-progress",
            Self::FileHashed { .. } => "file-hashed",
            Self::ArchiveHashed { .. } => "archive-hashed",
            Self::FileCopied { .. } => "file-copied",
            Self::FileMoved { .. } => "file-moved",
            Self::FileDeleted { .. } => "file-deleted",
            Self::SetCurrentFolder { .. } => "set-current-folder",
            Self::Key { .. } => "key",
            Self::Ready => "ready",
            Self::ScreenSize { .. } => "screen-size",
            Self::Stop => "stop",
            Self::Stopped => "stopped",
            Self::FolderBegin { .. } => "folder-begin",
            Self::Meta(_) => "meta",
            Self::FolderEnd => "folder-end",
        }
    }

    /// Decode one wire line. A trailing `\n` or `\r\n` is ignored.
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut parts = line.split('\t');
        let kind = parts.next().unwrap_or_default();
        if kind.is_empty() {
            return Err(ProtocolError::Empty);
        }
        let f = Fields::new(kind, parts);

        let msg = match kind {
            "scan" => Self::Scan {
                root: f.string("root")?,
            },
            "folder-scanned" => Self::FolderScanned {
                root: f.string("root")?,
                path: f.string("path")?,
            },
            "file-scanned" => Self::FileScanned {
                root: f.string("root")?,
                path: f.string("path")?,
                size: f.int("size")?,
                mod_time: f.time("mod-time")?,
            },
            "archive-scanned" => Self::ArchiveScanned {
                root: f.string("root")?,
            },
            "hashing-progress" => Self::HashingProgress {
                root: f.string("root")?,
                path: f.string("path")?,
                progress: f.int("progress")?,
            },
            "file-hashed" => Self::FileHashed {
                root: f.string("root")?,
                path: f.string("path")?,
                hash: f.string("hash")?,
            },
            "archive-hashed" => Self::ArchiveHashed {
                root: f.string("root")?,
            },
            "file-copied" => Self::FileCopied {
                root: f.string("root")?,
                path: f.string("path")?,
                to: f
                    .string("to")?
                    .split(':')
                    .filter(|r| !r.is_empty())
                    .map(str::to_owned)
                    .collect(),
            },
            "file-moved" => Self::FileMoved {
                root: f.string("root")?,
                from_path: f.string("from-path")?,
                to_path: f.string("to-path")?,
            },
            "file-deleted" => Self::FileDeleted {
                root: f.string("root")?,
                path: f.string("path")?,
            },
            "set-current-folder" => Self::SetCurrentFolder {
                root: f.string("root")?,
                path: f.string("path")?,
            },
            "key" => Self::Key {
                name: f.string("name")?,
            },
            "ready" => Self::Ready,
            "screen-size" => Self::ScreenSize {
                width: f.parsed("width")?,
                height: f.parsed("height")?,
            },
            "stop" => Self::Stop,
            "stopped" => Self::Stopped,
            "folder-begin" => Self::FolderBegin {
                root: f.string("root")?,
                path: f.string("path")?,
                archive_state: f.parsed("archive-state")?,
                sort: f.string("sort")?,
                ascending: f.parsed("ascending")?,
            },
            "meta" => Self::Meta(MetaLine {
                kind: f.parsed("kind")?,
                name: f.string("name")?,
                size: f.int("size")?,
                mod_time: f.opt_time("mod-time")?,
                state: f.parsed("state")?,
                progress: f.int("progress")?,
                counts: f.get("counts").unwrap_or_default().to_owned(),
                selected: f.parsed("selected")?,
            }),
            "folder-end" => Self::FolderEnd,
            other => return Err(ProtocolError::UnknownType(other.to_owned())),
        };
        Ok(msg)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())?;
        match self {
            Self::Scan { root } | Self::ArchiveScanned { root } | Self::ArchiveHashed { root } => {
                write!(f, "\troot={root}")
            }
            Self::FolderScanned { root, path }
            | Self::FileDeleted { root, path }
            | Self::SetCurrentFolder { root, path } => write!(f, "\troot={root}\tpath={path}"),
            Self::FileScanned {
                root,
                path,
                size,
                mod_time,
            } => write!(
                f,
                "\troot={root}\tpath={path}\tsize={size}\tmod-time={}",
                rfc3339(mod_time)
            ),
            Self::HashingProgress {
                root,
                path,
                progress,
            } => write!(f, "\troot={root}\tpath={path}\tprogress={progress}"),
            Self::FileHashed { root, path, hash } => {
                write!(f, "\troot={root}\tpath={path}\thash={hash}")
            }
            Self::FileCopied { root, path, to } => {
                write!(f, "\troot={root}\tpath={path}\tto={}", to.join(":"))
            }
            Self::FileMoved {
                root,
                from_path,
                to_path,
            } => write!(f, "\troot={root}\tfrom-path={from_path}\tto-path={to_path}"),
            Self::Key { name } => write!(f, "\tname={name}"),
            Self::ScreenSize { width, height } => write!(f, "\twidth={width}\theight={height}"),
            Self::FolderBegin {
                root,
                path,
                archive_state,
                sort,
                ascending,
            } => write!(
                f,
                "\troot={root}\tpath={path}\tarchive-state={archive_state}\tsort={sort}\tascending={ascending}"
            ),
            Self::Meta(line) => {
                write!(f, "\tkind={}\tname={}\tsize={}", line.kind, line.name, line.size)?;
                if let Some(mod_time) = &line.mod_time {
                    write!(f, "\tmod-time={}", rfc3339(mod_time))?;
                }
                write!(
                    f,
                    "\tstate={}\tprogress={}\tcounts={}\tselected={}",
                    line.state, line.progress, line.counts, line.selected
                )
            }
            Self::Ready | Self::Stop | Self::Stopped | Self::FolderEnd => Ok(()),
        }
    }
}

/// Whether `value` can be written verbatim as a field value: no tab, and no
/// line break that would split or end the line.
pub fn is_wire_safe(value: &str) -> bool {
    !value.contains(['\t', '\n', '\r'])
}

/// Render a presence vector as one glyph per root: `-` for none, the digit
/// for 1..=9, `*` above that.
pub fn presence_glyphs(counts: &[u32]) -> String {
    counts
        .iter()
        .map(|&count| match count {
            0 => '-',
            1..=9 => char::from_digit(count, 10).unwrap_or('*'),
            _ => '*',
        })
        .collect()
}

fn rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The `key=value` fields of one line, with typed accessors.
struct Fields<'a> {
    kind: &'a str,
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> Fields<'a> {
    fn new(kind: &'a str, parts: impl Iterator<Item = &'a str>) -> Self {
        // Parts without `=` carry nothing addressable and are skipped.
        let pairs = parts.filter_map(|part| part.split_once('=')).collect();
        Self { kind, pairs }
    }

    /// Later duplicates override earlier ones.
    fn get(&self, field: &str) -> Option<&'a str> {
        self.pairs
            .iter()
            .rev()
            .find(|(key, _)| *key == field)
            .map(|(_, value)| *value)
    }

    fn require(&self, field: &'static str) -> Result<&'a str, ProtocolError> {
        self.get(field).ok_or_else(|| ProtocolError::MissingField {
            kind: self.kind.to_owned(),
            field,
        })
    }

    fn string(&self, field: &'static str) -> Result<String, ProtocolError> {
        self.require(field).map(str::to_owned)
    }

    fn int(&self, field: &'static str) -> Result<u64, ProtocolError> {
        let value = self.require(field)?;
        value.parse().map_err(|_| ProtocolError::InvalidInt {
            kind: self.kind.to_owned(),
            field,
            value: value.to_owned(),
        })
    }

    fn time(&self, field: &'static str) -> Result<DateTime<Utc>, ProtocolError> {
        let value = self.require(field)?;
        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ProtocolError::InvalidTime {
                kind: self.kind.to_owned(),
                field,
                value: value.to_owned(),
            })
    }

    fn opt_time(&self, field: &'static str) -> Result<Option<DateTime<Utc>>, ProtocolError> {
        match self.get(field) {
            None | Some("") => Ok(None),
            Some(_) => self.time(field).map(Some),
        }
    }

    fn parsed<T: FromStr>(&self, field: &'static str) -> Result<T, ProtocolError> {
        let value = self.require(field)?;
        value.parse().map_err(|_| ProtocolError::InvalidValue {
            kind: self.kind.to_owned(),
            field,
            value: value.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_file_scanned() {
        let msg = Message::decode(
            "file-scanned\troot=origin\tpath=a/b.txt\tsize=42\tmod-time=2024-03-01T10:20:30Z\n",
        )
        .unwrap();
        assert_eq!(
            msg,
            Message::FileScanned {
                root: "origin".into(),
                path: "a/b.txt".into(),
                size: 42,
                mod_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap(),
            }
        );
    }

    #[test]
    fn test_encode_matches_wire_format() {
        let msg = Message::FileScanned {
            root: "origin".into(),
            path: "a/b.txt".into(),
            size: 42,
            mod_time: Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap(),
        };
        assert_eq!(
            msg.to_string(),
            "file-scanned\troot=origin\tpath=a/b.txt\tsize=42\tmod-time=2024-03-01T10:20:30Z"
        );
        assert_eq!(Message::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_value_may_contain_equals_sign() {
        let msg = Message::decode("scan\troot=/tmp/a=b").unwrap();
        assert_eq!(
            msg,
            Message::Scan {
                root: "/tmp/a=b".into()
            }
        );
    }

    #[test]
    fn test_root_path_is_empty_string() {
        let msg = Message::decode("folder-scanned\troot=r\tpath=").unwrap();
        assert_eq!(
            msg,
            Message::FolderScanned {
                root: "r".into(),
                path: String::new()
            }
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            Message::decode("explode\tnow=1"),
            Err(ProtocolError::UnknownType("explode".into()))
        );
        assert_eq!(Message::decode("\n"), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_missing_and_malformed_fields() {
        assert!(matches!(
            Message::decode("archive-hashed"),
            Err(ProtocolError::MissingField { field: "root", .. })
        ));
        assert!(matches!(
            Message::decode("hashing-progress\troot=r\tpath=p\tprogress=lots"),
            Err(ProtocolError::InvalidInt { field: "progress", .. })
        ));
        assert!(matches!(
            Message::decode("file-scanned\troot=r\tpath=p\tsize=1\tmod-time=yesterday"),
            Err(ProtocolError::InvalidTime { field: "mod-time", .. })
        ));
        assert!(matches!(
            Message::decode("screen-size\twidth=80\theight=-1"),
            Err(ProtocolError::InvalidValue { field: "height", .. })
        ));
    }

    #[test]
    fn test_file_copied_root_list() {
        let msg = Message::decode("file-copied\troot=a\tpath=x\tto=b:c").unwrap();
        assert_eq!(
            msg,
            Message::FileCopied {
                root: "a".into(),
                path: "x".into(),
                to: vec!["b".into(), "c".into()],
            }
        );
        assert_eq!(msg.to_string(), "file-copied\troot=a\tpath=x\tto=b:c");
    }

    #[test]
    fn test_meta_line_without_mod_time() {
        let line = MetaLine {
            kind: Kind::Folder,
            name: "empty".into(),
            size: 0,
            mod_time: None,
            state: State::Resolved,
            progress: 0,
            counts: String::new(),
            selected: true,
        };
        let encoded = Message::Meta(line.clone()).to_string();
        assert_eq!(
            encoded,
            "meta\tkind=F\tname=empty\tsize=0\tstate=resolved\tprogress=0\tcounts=\tselected=true"
        );
        assert_eq!(Message::decode(&encoded), Ok(Message::Meta(line)));
    }

    #[test]
    fn test_presence_glyphs() {
        assert_eq!(presence_glyphs(&[1, 0, 0]), "1--");
        assert_eq!(presence_glyphs(&[2, 9, 12]), "29*");
        assert_eq!(presence_glyphs(&[]), "");
    }

    #[test]
    fn test_is_wire_safe() {
        assert!(is_wire_safe("a/b c.txt"));
        assert!(is_wire_safe(""));
        assert!(!is_wire_safe("bad\nname"));
        assert!(!is_wire_safe("tab\there"));
        assert!(!is_wire_safe("cr\r"));
    }
}
