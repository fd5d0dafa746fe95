//! Attribute values and their canonical encoding.

use bytestream::{Deserializer, Serializer, StreamError, StreamResult};

const TAG_BOOL: u8 = 1;
const TAG_U32: u8 = 2;
const TAG_U64: u8 = 3;
const TAG_F32: u8 = 4;
const TAG_F64: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_BYTES: u8 = 7;

/// A typed attribute value.
///
/// The canonical encoding is one tag byte followed by the value. Canonical
/// means exactly that and nothing else: fixed slot order at the component
/// level, no padding, so re-serializing a component after a delta apply
/// reproduces the sender's bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl AttributeValue {
    /// Returns the encoding tag for this value's type.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Bool(_) => TAG_BOOL,
            Self::U32(_) => TAG_U32,
            Self::U64(_) => TAG_U64,
            Self::F32(_) => TAG_F32,
            Self::F64(_) => TAG_F64,
            Self::String(_) => TAG_STRING,
            Self::Bytes(_) => TAG_BYTES,
        }
    }

    /// Compares two values for delta purposes.
    ///
    /// Floats are compared by bit pattern so a NaN baseline does not read as
    /// perpetually changed.
    #[must_use]
    pub fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::F32(a), Self::F32(b)) => a.to_bits() == b.to_bits(),
            (Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    /// Writes the tagged value.
    pub fn write(&self, ser: &mut Serializer) -> StreamResult<()> {
        ser.write_u8(self.tag())?;
        match self {
            Self::Bool(v) => ser.write_u8(u8::from(*v)),
            Self::U32(v) => ser.write_u32(*v),
            Self::U64(v) => ser.write_u64(*v),
            Self::F32(v) => ser.write_f32(*v),
            Self::F64(v) => ser.write_f64(*v),
            Self::String(v) => ser.write_str(v),
            Self::Bytes(v) => ser.write_blob(v),
        }
    }

    /// Reads a tagged value.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidEncoding`] on an unknown tag or an
    /// out-of-range boolean byte.
    pub fn read(de: &mut Deserializer<'_>) -> StreamResult<Self> {
        let tag_pos = de.position();
        let tag = de.read_u8()?;
        match tag {
            TAG_BOOL => {
                let pos = de.position();
                match de.read_u8()? {
                    0 => Ok(Self::Bool(false)),
                    1 => Ok(Self::Bool(true)),
                    _ => Err(StreamError::InvalidEncoding { position: pos }),
                }
            }
            TAG_U32 => Ok(Self::U32(de.read_u32()?)),
            TAG_U64 => Ok(Self::U64(de.read_u64()?)),
            TAG_F32 => Ok(Self::F32(de.read_f32()?)),
            TAG_F64 => Ok(Self::F64(de.read_f64()?)),
            TAG_STRING => Ok(Self::String(de.read_str()?.to_owned())),
            TAG_BYTES => Ok(Self::Bytes(de.read_blob()?.to_vec())),
            _ => Err(StreamError::InvalidEncoding { position: tag_pos }),
        }
    }
}
