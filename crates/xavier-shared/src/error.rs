//! Error types for Xavier.

use thiserror::Error;

/// Failures while moving a single frame across a byte stream.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The stream closed before a complete 4-byte length prefix arrived.
    #[error("end of stream ({received} of 4 header bytes)")]
    EndOfStream { received: usize },

    #[error("zero-length frame")]
    ZeroLength,

    #[error("truncated frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    #[error("frame too large: {0} bytes")]
    TooLarge(usize),

    /// Payload bytes were not valid UTF-8 JSON of the expected shape.
    #[error("undecodable payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True when the peer simply closed its end.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, FrameError::EndOfStream { .. })
    }

    /// True when the stream is still usable for the next frame.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::ZeroLength | FrameError::Payload(_))
    }
}

/// A message that does not satisfy the wire schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("{kind} message is missing an id")]
    MissingId { kind: &'static str },

    #[error("confidence {0} is outside [0.0, 1.0]")]
    ConfidenceOutOfRange(f64),

    #[error("hint_click requires a non-empty hint of letters A-Z, got {0:?}")]
    InvalidHint(String),

    #[error("{command} takes no argument named {arg:?}")]
    UnexpectedArg { command: String, arg: String },
}

#[derive(Error, Debug)]
pub enum XavierError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl XavierError {
    pub fn code(&self) -> i32 {
        match self {
            XavierError::Frame(_) => -32001,
            XavierError::Schema(_) => -32600,
            XavierError::UnknownCommand(_) => -32601,
            XavierError::Json(_) => -32700,
        }
    }
}
