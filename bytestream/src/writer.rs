//! Bounded little-endian serializer.

use crate::error::{StreamError, StreamResult};

/// Maximum length a u16-prefixed string may have.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// A byte serializer with a fixed capacity and a fill cursor.
///
/// All integers are written little-endian. Writes that would exceed the
/// capacity fail with [`StreamError::BufferOverflow`] and leave the buffer
/// unchanged.
#[derive(Debug)]
pub struct Serializer {
    buf: Vec<u8>,
    capacity: usize,
}

impl Serializer {
    /// Creates a serializer that can hold at most `capacity` bytes.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
        }
    }

    /// Returns the number of bytes written so far.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the fixed capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Consumes the serializer and returns the written bytes.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn ensure(&self, extra: usize) -> StreamResult<()> {
        let needed = self.buf.len() + extra;
        if needed > self.capacity {
            return Err(StreamError::BufferOverflow {
                needed,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) -> StreamResult<()> {
        self.ensure(1)?;
        self.buf.push(value);
        Ok(())
    }

    /// Writes a little-endian u16.
    pub fn write_u16(&mut self, value: u16) -> StreamResult<()> {
        self.ensure(2)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a little-endian u32.
    pub fn write_u32(&mut self, value: u32) -> StreamResult<()> {
        self.ensure(4)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a little-endian u64.
    pub fn write_u64(&mut self, value: u64) -> StreamResult<()> {
        self.ensure(8)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a little-endian f32.
    pub fn write_f32(&mut self, value: f32) -> StreamResult<()> {
        self.ensure(4)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a little-endian f64.
    pub fn write_f64(&mut self, value: f64) -> StreamResult<()> {
        self.ensure(8)?;
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a UTF-8 string with a u16 length prefix.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::LengthOverflow`] if the string is longer than
    /// 65535 bytes, [`StreamError::BufferOverflow`] if it does not fit.
    pub fn write_str(&mut self, value: &str) -> StreamResult<()> {
        let bytes = value.as_bytes();
        let len = u16::try_from(bytes.len()).map_err(|_| StreamError::LengthOverflow {
            length: bytes.len(),
            max: MAX_STRING_LEN,
        })?;
        self.ensure(2 + bytes.len())?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes a raw byte blob with a u32 length prefix.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::LengthOverflow`] if the blob is longer than
    /// `u32::MAX` bytes, [`StreamError::BufferOverflow`] if it does not fit.
    pub fn write_blob(&mut self, value: &[u8]) -> StreamResult<()> {
        let len = u32::try_from(value.len()).map_err(|_| StreamError::LengthOverflow {
            length: value.len(),
            max: u32::MAX as usize,
        })?;
        self.ensure(4 + value.len())?;
        self.buf.extend_from_slice(&len.to_le_bytes());
        self.buf.extend_from_slice(value);
        Ok(())
    }

    /// Writes raw bytes with no length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> StreamResult<()> {
        self.ensure(value.len())?;
        self.buf.extend_from_slice(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_serializer() {
        let ser = Serializer::new(16);
        assert!(ser.is_empty());
        assert_eq!(ser.bytes_written(), 0);
        assert_eq!(ser.capacity(), 16);
        assert!(ser.finish().is_empty());
    }

    #[test]
    fn write_primitives_little_endian() {
        let mut ser = Serializer::new(64);
        ser.write_u8(0xAB).unwrap();
        ser.write_u16(0x1234).unwrap();
        ser.write_u32(0xDEAD_BEEF).unwrap();
        let bytes = ser.finish();
        assert_eq!(bytes, vec![0xAB, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn write_u64_little_endian() {
        let mut ser = Serializer::new(8);
        ser.write_u64(0x0102_0304_0506_0708).unwrap();
        assert_eq!(
            ser.finish(),
            vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn write_floats() {
        let mut ser = Serializer::new(12);
        ser.write_f32(1.5).unwrap();
        ser.write_f64(-2.25).unwrap();
        let bytes = ser.finish();
        assert_eq!(&bytes[0..4], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[4..12], &(-2.25f64).to_le_bytes());
    }

    #[test]
    fn write_str_prefixes_length() {
        let mut ser = Serializer::new(16);
        ser.write_str("abc").unwrap();
        assert_eq!(ser.finish(), vec![3, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn write_empty_str() {
        let mut ser = Serializer::new(4);
        ser.write_str("").unwrap();
        assert_eq!(ser.finish(), vec![0, 0]);
    }

    #[test]
    fn write_blob_prefixes_length() {
        let mut ser = Serializer::new(16);
        ser.write_blob(&[9, 8, 7]).unwrap();
        assert_eq!(ser.finish(), vec![3, 0, 0, 0, 9, 8, 7]);
    }

    #[test]
    fn overflow_leaves_buffer_unchanged() {
        let mut ser = Serializer::new(4);
        ser.write_u16(1).unwrap();
        let result = ser.write_u32(2);
        assert!(matches!(
            result,
            Err(StreamError::BufferOverflow {
                needed: 6,
                capacity: 4
            })
        ));
        assert_eq!(ser.bytes_written(), 2);
    }

    #[test]
    fn overflow_on_exact_boundary_is_ok() {
        let mut ser = Serializer::new(4);
        ser.write_u32(7).unwrap();
        assert!(ser.write_u8(1).is_err());
    }

    #[test]
    fn str_overflow_reports_full_size() {
        let mut ser = Serializer::new(4);
        let result = ser.write_str("hello");
        assert!(matches!(
            result,
            Err(StreamError::BufferOverflow {
                needed: 7,
                capacity: 4
            })
        ));
        assert!(ser.is_empty());
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let mut ser = Serializer::new(0);
        assert!(ser.write_u8(0).is_err());
        assert!(ser.write_str("").is_err());
    }
}
