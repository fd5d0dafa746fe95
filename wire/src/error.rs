//! Error types for wire message operations.

use std::fmt;

use bytestream::StreamError;

/// Result type for wire message operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while encoding or decoding sync messages.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WireError {
    /// Unknown message id byte.
    UnknownMessageId {
        /// The rejected id byte.
        id: u8,
    },

    /// Underlying byte stream failure.
    Stream(StreamError),

    /// A decode limit was exceeded.
    LimitsExceeded {
        kind: LimitKind,
        limit: usize,
        actual: usize,
    },

    /// Bytes remained after the message body was fully decoded.
    TrailingBytes {
        /// Number of unconsumed bytes.
        remaining: usize,
    },
}

/// Specific wire limits that can be exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    MessageBytes,
    ComponentCount,
    NameLength,
    DataLength,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMessageId { id } => {
                write!(f, "unknown message id: 0x{id:02X}")
            }
            Self::Stream(e) => write!(f, "stream error: {e}"),
            Self::LimitsExceeded {
                kind,
                limit,
                actual,
            } => {
                write!(f, "limit exceeded ({kind:?}): {actual} > {limit}")
            }
            Self::TrailingBytes { remaining } => {
                write!(f, "{remaining} trailing bytes after message body")
            }
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StreamError> for WireError {
    fn from(err: StreamError) -> Self {
        Self::Stream(err)
    }
}
