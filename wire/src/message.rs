//! Sync message schemas and their encoding.

use bytestream::{Deserializer, Serializer};

use crate::error::{LimitKind, WireError, WireResult};
use crate::limits::WireLimits;

/// Message id bytes, stable across client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    CreateEntity = 0xC1,
    RemoveEntity = 0xC2,
    CreateComponents = 0xC3,
    UpdateComponents = 0xC4,
    RemoveComponents = 0xC5,
    EntityIdCollision = 0xC6,
}

impl MessageId {
    /// Parses a message id from its raw byte.
    pub fn parse(id: u8) -> WireResult<Self> {
        match id {
            0xC1 => Ok(Self::CreateEntity),
            0xC2 => Ok(Self::RemoveEntity),
            0xC3 => Ok(Self::CreateComponents),
            0xC4 => Ok(Self::UpdateComponents),
            0xC5 => Ok(Self::RemoveComponents),
            0xC6 => Ok(Self::EntityIdCollision),
            _ => Err(WireError::UnknownMessageId { id }),
        }
    }
}

/// A component with a serialized body: `(type_hash, name, data)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFull {
    pub type_hash: u32,
    pub name: String,
    pub data: Vec<u8>,
}

/// A component reference without a body: `(type_hash, name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub type_hash: u32,
    pub name: String,
}

/// The six scene sync message kinds.
///
/// Entity ids are carried raw; interpretation (local-only bit, validity)
/// belongs to the replication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// Full state of a newly replicated entity.
    CreateEntity {
        entity_id: u32,
        components: Vec<ComponentFull>,
    },
    /// An entity was removed.
    RemoveEntity { entity_id: u32 },
    /// Full state for components the peer has not seen.
    CreateComponents {
        entity_id: u32,
        components: Vec<ComponentFull>,
    },
    /// Delta-encoded component bodies.
    UpdateComponents {
        entity_id: u32,
        components: Vec<ComponentFull>,
    },
    /// Components were removed.
    RemoveComponents {
        entity_id: u32,
        components: Vec<ComponentRef>,
    },
    /// The server rejected a client-chosen entity id.
    EntityIdCollision {
        old_entity_id: u32,
        new_entity_id: u32,
    },
}

impl SyncMessage {
    /// Returns the message's wire id.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        match self {
            Self::CreateEntity { .. } => MessageId::CreateEntity,
            Self::RemoveEntity { .. } => MessageId::RemoveEntity,
            Self::CreateComponents { .. } => MessageId::CreateComponents,
            Self::UpdateComponents { .. } => MessageId::UpdateComponents,
            Self::RemoveComponents { .. } => MessageId::RemoveComponents,
            Self::EntityIdCollision { .. } => MessageId::EntityIdCollision,
        }
    }

    /// Returns the entity id the message acts on (`old_entity_id` for
    /// collisions).
    #[must_use]
    pub const fn entity_id(&self) -> u32 {
        match self {
            Self::CreateEntity { entity_id, .. }
            | Self::RemoveEntity { entity_id }
            | Self::CreateComponents { entity_id, .. }
            | Self::UpdateComponents { entity_id, .. }
            | Self::RemoveComponents { entity_id, .. } => *entity_id,
            Self::EntityIdCollision { old_entity_id, .. } => *old_entity_id,
        }
    }
}

/// Encodes a message into a fresh buffer.
///
/// Components with an empty `data` blob carry no state and are skipped, as
/// the receiving side would skip them anyway.
///
/// # Errors
///
/// Returns [`WireError::Stream`] when the message does not fit in
/// `limits.max_message_bytes`.
pub fn encode_message(message: &SyncMessage, limits: &WireLimits) -> WireResult<Vec<u8>> {
    let mut ser = Serializer::new(limits.max_message_bytes);
    ser.write_u8(message.id() as u8)?;
    match message {
        SyncMessage::CreateEntity {
            entity_id,
            components,
        }
        | SyncMessage::CreateComponents {
            entity_id,
            components,
        }
        | SyncMessage::UpdateComponents {
            entity_id,
            components,
        } => {
            ser.write_u32(*entity_id)?;
            let present: Vec<&ComponentFull> =
                components.iter().filter(|c| !c.data.is_empty()).collect();
            write_count(&mut ser, present.len(), limits)?;
            for component in present {
                ser.write_u32(component.type_hash)?;
                ser.write_str(&component.name)?;
                ser.write_blob(&component.data)?;
            }
        }
        SyncMessage::RemoveEntity { entity_id } => {
            ser.write_u32(*entity_id)?;
        }
        SyncMessage::RemoveComponents {
            entity_id,
            components,
        } => {
            ser.write_u32(*entity_id)?;
            write_count(&mut ser, components.len(), limits)?;
            for component in components {
                ser.write_u32(component.type_hash)?;
                ser.write_str(&component.name)?;
            }
        }
        SyncMessage::EntityIdCollision {
            old_entity_id,
            new_entity_id,
        } => {
            ser.write_u32(*old_entity_id)?;
            ser.write_u32(*new_entity_id)?;
        }
    }
    Ok(ser.finish())
}

/// Decodes a message, enforcing limits on untrusted input.
///
/// Bodiless components (empty `data` blob) are legal on the wire and are
/// dropped here; a decoded message never contains one.
///
/// # Errors
///
/// Returns [`WireError::UnknownMessageId`], [`WireError::LimitsExceeded`],
/// [`WireError::TrailingBytes`], or [`WireError::Stream`] for truncated or
/// malformed bodies.
pub fn decode_message(bytes: &[u8], limits: &WireLimits) -> WireResult<SyncMessage> {
    if bytes.len() > limits.max_message_bytes {
        return Err(WireError::LimitsExceeded {
            kind: LimitKind::MessageBytes,
            limit: limits.max_message_bytes,
            actual: bytes.len(),
        });
    }

    let mut de = Deserializer::new(bytes);
    let id = MessageId::parse(de.read_u8()?)?;
    let message = match id {
        MessageId::CreateEntity => {
            let entity_id = de.read_u32()?;
            let components = read_full_components(&mut de, limits)?;
            SyncMessage::CreateEntity {
                entity_id,
                components,
            }
        }
        MessageId::RemoveEntity => SyncMessage::RemoveEntity {
            entity_id: de.read_u32()?,
        },
        MessageId::CreateComponents => {
            let entity_id = de.read_u32()?;
            let components = read_full_components(&mut de, limits)?;
            SyncMessage::CreateComponents {
                entity_id,
                components,
            }
        }
        MessageId::UpdateComponents => {
            let entity_id = de.read_u32()?;
            let components = read_full_components(&mut de, limits)?;
            SyncMessage::UpdateComponents {
                entity_id,
                components,
            }
        }
        MessageId::RemoveComponents => {
            let entity_id = de.read_u32()?;
            let count = read_count(&mut de, limits)?;
            let mut components = Vec::with_capacity(count);
            for _ in 0..count {
                let type_hash = de.read_u32()?;
                let name = read_name(&mut de, limits)?;
                components.push(ComponentRef { type_hash, name });
            }
            SyncMessage::RemoveComponents {
                entity_id,
                components,
            }
        }
        MessageId::EntityIdCollision => SyncMessage::EntityIdCollision {
            old_entity_id: de.read_u32()?,
            new_entity_id: de.read_u32()?,
        },
    };

    if !de.is_empty() {
        return Err(WireError::TrailingBytes {
            remaining: de.remaining(),
        });
    }
    Ok(message)
}

fn write_count(ser: &mut Serializer, count: usize, limits: &WireLimits) -> WireResult<()> {
    if count > limits.max_components {
        return Err(WireError::LimitsExceeded {
            kind: LimitKind::ComponentCount,
            limit: limits.max_components,
            actual: count,
        });
    }
    ser.write_u16(count as u16)?;
    Ok(())
}

fn read_count(de: &mut Deserializer<'_>, limits: &WireLimits) -> WireResult<usize> {
    let count = de.read_u16()? as usize;
    if count > limits.max_components {
        return Err(WireError::LimitsExceeded {
            kind: LimitKind::ComponentCount,
            limit: limits.max_components,
            actual: count,
        });
    }
    Ok(count)
}

fn read_name(de: &mut Deserializer<'_>, limits: &WireLimits) -> WireResult<String> {
    let name = de.read_str()?;
    if name.len() > limits.max_name_len {
        return Err(WireError::LimitsExceeded {
            kind: LimitKind::NameLength,
            limit: limits.max_name_len,
            actual: name.len(),
        });
    }
    Ok(name.to_owned())
}

fn read_full_components(
    de: &mut Deserializer<'_>,
    limits: &WireLimits,
) -> WireResult<Vec<ComponentFull>> {
    let count = read_count(de, limits)?;
    let mut components = Vec::with_capacity(count);
    for _ in 0..count {
        let type_hash = de.read_u32()?;
        let name = read_name(de, limits)?;
        let data = de.read_blob()?;
        if data.len() > limits.max_data_len {
            return Err(WireError::LimitsExceeded {
                kind: LimitKind::DataLength,
                limit: limits.max_data_len,
                actual: data.len(),
            });
        }
        // An empty blob signals "no body"; the component carries nothing.
        if data.is_empty() {
            continue;
        }
        components.push(ComponentFull {
            type_hash,
            name,
            data: data.to_vec(),
        });
    }
    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(message: &SyncMessage) -> SyncMessage {
        let limits = WireLimits::for_testing();
        let bytes = encode_message(message, &limits).unwrap();
        decode_message(&bytes, &limits).unwrap()
    }

    #[test]
    fn message_id_parse_known() {
        for (raw, id) in [
            (0xC1, MessageId::CreateEntity),
            (0xC2, MessageId::RemoveEntity),
            (0xC3, MessageId::CreateComponents),
            (0xC4, MessageId::UpdateComponents),
            (0xC5, MessageId::RemoveComponents),
            (0xC6, MessageId::EntityIdCollision),
        ] {
            assert_eq!(MessageId::parse(raw).unwrap(), id);
        }
    }

    #[test]
    fn message_id_parse_unknown() {
        assert!(matches!(
            MessageId::parse(0x00),
            Err(WireError::UnknownMessageId { id: 0x00 })
        ));
    }

    #[test]
    fn create_entity_roundtrip() {
        let message = SyncMessage::CreateEntity {
            entity_id: 100,
            components: vec![ComponentFull {
                type_hash: 0xAB,
                name: "T".to_owned(),
                data: vec![42],
            }],
        };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn remove_entity_roundtrip() {
        let message = SyncMessage::RemoveEntity { entity_id: 7 };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn remove_components_roundtrip() {
        let message = SyncMessage::RemoveComponents {
            entity_id: 7,
            components: vec![
                ComponentRef {
                    type_hash: 1,
                    name: "a".to_owned(),
                },
                ComponentRef {
                    type_hash: 2,
                    name: String::new(),
                },
            ],
        };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn collision_roundtrip() {
        let message = SyncMessage::EntityIdCollision {
            old_entity_id: 50,
            new_entity_id: 51,
        };
        assert_eq!(roundtrip(&message), message);
    }

    #[test]
    fn collision_layout_is_stable() {
        let limits = WireLimits::for_testing();
        let bytes = encode_message(
            &SyncMessage::EntityIdCollision {
                old_entity_id: 50,
                new_entity_id: 51,
            },
            &limits,
        )
        .unwrap();
        assert_eq!(bytes, vec![0xC6, 50, 0, 0, 0, 51, 0, 0, 0]);
    }

    #[test]
    fn empty_data_components_skipped_on_encode() {
        let limits = WireLimits::for_testing();
        let message = SyncMessage::UpdateComponents {
            entity_id: 1,
            components: vec![
                ComponentFull {
                    type_hash: 1,
                    name: "a".to_owned(),
                    data: Vec::new(),
                },
                ComponentFull {
                    type_hash: 2,
                    name: "b".to_owned(),
                    data: vec![9],
                },
            ],
        };
        let bytes = encode_message(&message, &limits).unwrap();
        let decoded = decode_message(&bytes, &limits).unwrap();
        match decoded {
            SyncMessage::UpdateComponents { components, .. } => {
                assert_eq!(components.len(), 1);
                assert_eq!(components[0].type_hash, 2);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_truncated_body() {
        let limits = WireLimits::for_testing();
        let bytes = encode_message(&SyncMessage::RemoveEntity { entity_id: 9 }, &limits).unwrap();
        let err = decode_message(&bytes[..3], &limits).unwrap_err();
        assert!(matches!(err, WireError::Stream(_)));
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let limits = WireLimits::for_testing();
        let mut bytes =
            encode_message(&SyncMessage::RemoveEntity { entity_id: 9 }, &limits).unwrap();
        bytes.push(0);
        assert!(matches!(
            decode_message(&bytes, &limits),
            Err(WireError::TrailingBytes { remaining: 1 })
        ));
    }

    #[test]
    fn decode_enforces_component_count() {
        let limits = WireLimits::for_testing();
        // Forge a CreateEntity header claiming more components than allowed.
        let mut ser = bytestream::Serializer::new(64);
        ser.write_u8(0xC1).unwrap();
        ser.write_u32(1).unwrap();
        ser.write_u16(limits.max_components as u16 + 1).unwrap();
        let err = decode_message(&ser.finish(), &limits).unwrap_err();
        assert!(matches!(
            err,
            WireError::LimitsExceeded {
                kind: LimitKind::ComponentCount,
                ..
            }
        ));
    }

    #[test]
    fn decode_enforces_message_bytes() {
        let limits = WireLimits::for_testing();
        let oversized = vec![0u8; limits.max_message_bytes + 1];
        assert!(matches!(
            decode_message(&oversized, &limits),
            Err(WireError::LimitsExceeded {
                kind: LimitKind::MessageBytes,
                ..
            })
        ));
    }

    #[test]
    fn decode_enforces_data_length() {
        let limits = WireLimits {
            max_message_bytes: 4096,
            max_components: 16,
            max_name_len: 64,
            max_data_len: 4,
        };
        let message = SyncMessage::CreateEntity {
            entity_id: 1,
            components: vec![ComponentFull {
                type_hash: 1,
                name: "a".to_owned(),
                data: vec![0; 8],
            }],
        };
        let bytes = encode_message(&message, &WireLimits::for_testing()).unwrap();
        assert!(matches!(
            decode_message(&bytes, &limits),
            Err(WireError::LimitsExceeded {
                kind: LimitKind::DataLength,
                ..
            })
        ));
    }

    #[test]
    fn entity_id_accessor() {
        assert_eq!(SyncMessage::RemoveEntity { entity_id: 3 }.entity_id(), 3);
        assert_eq!(
            SyncMessage::EntityIdCollision {
                old_entity_id: 50,
                new_entity_id: 51
            }
            .entity_id(),
            50
        );
    }
}
