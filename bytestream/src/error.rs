//! Error types for byte stream operations.

use std::fmt;

/// Result type for byte stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur during byte-level encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A write would exceed the serializer's fixed capacity.
    BufferOverflow {
        /// Total bytes the buffer would need to hold.
        needed: usize,
        /// The serializer's capacity.
        capacity: usize,
    },

    /// A read requested more bytes than remain in the buffer.
    ShortRead {
        /// Number of bytes requested.
        requested: usize,
        /// Number of bytes available.
        available: usize,
    },

    /// The bytes at the cursor are not a valid encoding (e.g. non-UTF-8 string data).
    InvalidEncoding {
        /// Byte offset at which the invalid encoding begins.
        position: usize,
    },

    /// A length field cannot represent the value being written.
    LengthOverflow {
        /// The actual length.
        length: usize,
        /// Maximum length the prefix can represent.
        max: usize,
    },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferOverflow { needed, capacity } => {
                write!(
                    f,
                    "buffer overflow: {needed} bytes needed, capacity is {capacity}"
                )
            }
            Self::ShortRead {
                requested,
                available,
            } => {
                write!(
                    f,
                    "short read: requested {requested} bytes, {available} available"
                )
            }
            Self::InvalidEncoding { position } => {
                write!(f, "invalid encoding at byte offset {position}")
            }
            Self::LengthOverflow { length, max } => {
                write!(f, "length {length} exceeds prefix maximum {max}")
            }
        }
    }
}

impl std::error::Error for StreamError {}
