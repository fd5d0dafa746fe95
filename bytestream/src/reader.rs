//! Bounded little-endian deserializer.

use crate::error::{StreamError, StreamResult};

/// A byte deserializer over a borrowed slice with a read cursor.
///
/// All read operations are bounds-checked and return errors on failure.
/// The reader never panics on malformed input.
#[derive(Debug)]
pub struct Deserializer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Deserializer<'a> {
    /// Creates a deserializer over a byte slice.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of bytes remaining to read.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` if there are no more bytes to read.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the current read position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, count: usize) -> StreamResult<&'a [u8]> {
        if count > self.remaining() {
            return Err(StreamError::ShortRead {
                requested: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> StreamResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> StreamResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> StreamResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian u64.
    pub fn read_u64(&mut self) -> StreamResult<u64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads a little-endian f32.
    pub fn read_f32(&mut self) -> StreamResult<f32> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian f64.
    pub fn read_f64(&mut self) -> StreamResult<f64> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(raw))
    }

    /// Reads a u16-length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::ShortRead`] if the prefix or body is truncated,
    /// [`StreamError::InvalidEncoding`] if the body is not valid UTF-8.
    pub fn read_str(&mut self) -> StreamResult<&'a str> {
        let len = self.read_u16()? as usize;
        let start = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| StreamError::InvalidEncoding { position: start })
    }

    /// Reads a u32-length-prefixed byte blob.
    pub fn read_blob(&mut self) -> StreamResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Reads `count` raw bytes with no length prefix.
    pub fn read_bytes(&mut self, count: usize) -> StreamResult<&'a [u8]> {
        self.take(count)
    }
}
