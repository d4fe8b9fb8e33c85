/// Line-oriented wire protocol shared by the engine, scanner and UI.
///
/// One message per line: `<type>\t<key>=<value>\t...`. Values are written
/// verbatim, so they must not contain tabs or newlines. Timestamps are
/// RFC3339, integers decimal.
pub mod error;
pub mod message;

pub use error::ProtocolError;
pub use message::{is_wire_safe, presence_glyphs, Message, MetaLine};
