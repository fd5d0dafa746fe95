//! Wire message layout for the scene sync protocol.
//!
//! This crate defines the six sync message kinds and their little-endian
//! byte layout. It handles message structure, not scene logic: entity ids
//! are raw `u32`s here and component bodies are opaque blobs. Transport
//! framing (length prefixes, reliability, ordering) is the transport's job.
//!
//! # Design Principles
//!
//! - **Stable wire format** - Message ids and layouts are fixed; both sides
//!   of a connection must agree byte for byte.
//! - **Bounded decoding** - All counts and lengths are validated against
//!   [`WireLimits`] before allocation.
//! - **No domain knowledge** - Validity of ids and bodies is the
//!   replication layer's concern.

mod error;
mod limits;
mod message;

pub use error::{LimitKind, WireError, WireResult};
pub use limits::WireLimits;
pub use message::{
    decode_message, encode_message, ComponentFull, ComponentRef, MessageId, SyncMessage,
};
