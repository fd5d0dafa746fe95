//! Bounded byte-level serialization primitives for the scene sync protocol.
//!
//! This crate provides a fixed-capacity [`Serializer`] and a bounds-checked
//! [`Deserializer`] for little-endian binary encoding. Delta encoding is a
//! cursor-pairing concern: a delta writer is a [`Serializer`] advanced in
//! parallel with a [`Deserializer`] over the previous bytes, and the
//! per-attribute comparison lives with the data type being encoded.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads and writes are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about entities,
//!   components, or scene state.
//! - **Explicit errors** - All failures return structured errors, never panic.
//!
//! # Example
//!
//! ```
//! use bytestream::{Deserializer, Serializer};
//!
//! let mut ser = Serializer::new(64);
//! ser.write_u32(42).unwrap();
//! ser.write_str("hello").unwrap();
//!
//! let bytes = ser.finish();
//!
//! let mut de = Deserializer::new(&bytes);
//! assert_eq!(de.read_u32().unwrap(), 42);
//! assert_eq!(de.read_str().unwrap(), "hello");
//! ```

mod error;
mod reader;
mod writer;

pub use error::{StreamError, StreamResult};
pub use reader::Deserializer;
pub use writer::{Serializer, MAX_STRING_LEN};
