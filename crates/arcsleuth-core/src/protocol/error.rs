/// Errors raised while decoding a wire line.
///
/// Every variant is a fatal fault for the current run: the engine never
/// applies a partially understood message.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty message line")]
    Empty,

    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown message type {0:?}")]
    UnknownType(String),

    #[error("{kind} message is missing field {field:?}")]
    MissingField { kind: String, field: &'static str },

    #[error("{kind} message field {field:?}: invalid integer {value:?}")]
    InvalidInt {
        kind: String,
        field: &'static str,
        value: String,
    },

    #[error("{kind} message field {field:?}: invalid RFC3339 timestamp {value:?}")]
    InvalidTime {
        kind: String,
        field: &'static str,
        value: String,
    },

    #[error("{kind} message field {field:?}: invalid value {value:?}")]
    InvalidValue {
        kind: String,
        field: &'static str,
        value: String,
    },
}
