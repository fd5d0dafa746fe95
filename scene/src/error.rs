//! Error types for scene graph operations.

use std::fmt;

use crate::types::EntityId;

/// Result type for scene graph operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors that can occur while mutating the scene graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The entity id is not present in the scene.
    UnknownEntity {
        /// The missing entity id.
        id: EntityId,
    },

    /// An entity with this id already exists.
    DuplicateEntity {
        /// The conflicting entity id.
        id: EntityId,
    },

    /// The entity id is not usable (id zero is reserved).
    InvalidId {
        /// The rejected id.
        id: EntityId,
    },

    /// Every id in the replicable range is in use.
    IdSpaceExhausted,

    /// No component spec is registered for this type hash.
    UnknownComponentType {
        /// The unregistered type hash.
        type_hash: u32,
    },

    /// The attribute slot does not exist on the component.
    SlotOutOfRange {
        /// The requested slot.
        slot: usize,
        /// Number of attribute slots on the component.
        count: usize,
    },

    /// The value's type does not match the attribute slot's type.
    AttributeTypeMismatch {
        /// The slot being assigned.
        slot: usize,
    },

    /// A component spec with this type hash is already registered.
    DuplicateComponentType {
        /// The conflicting type hash.
        type_hash: u32,
    },
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEntity { id } => {
                write!(f, "entity {} not found", id.raw())
            }
            Self::DuplicateEntity { id } => {
                write!(f, "entity {} already exists", id.raw())
            }
            Self::InvalidId { id } => {
                write!(f, "entity id {} is not usable", id.raw())
            }
            Self::IdSpaceExhausted => {
                write!(f, "replicable entity id space is exhausted")
            }
            Self::UnknownComponentType { type_hash } => {
                write!(f, "no component spec registered for type hash 0x{type_hash:08X}")
            }
            Self::SlotOutOfRange { slot, count } => {
                write!(f, "attribute slot {slot} out of range, component has {count}")
            }
            Self::AttributeTypeMismatch { slot } => {
                write!(f, "attribute type mismatch at slot {slot}")
            }
            Self::DuplicateComponentType { type_hash } => {
                write!(f, "component type hash 0x{type_hash:08X} already registered")
            }
        }
    }
}

impl std::error::Error for SceneError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_unknown_entity() {
        let err = SceneError::UnknownEntity {
            id: EntityId::new(42),
        };
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn error_display_unknown_component_type() {
        let err = SceneError::UnknownComponentType { type_hash: 0xAB };
        let msg = err.to_string();
        assert!(msg.contains("000000AB"), "should format the hash as hex");
    }

    #[test]
    fn error_display_id_space_exhausted() {
        let err = SceneError::IdSpaceExhausted;
        assert!(err.to_string().contains("exhausted"));
    }

    #[test]
    fn error_display_slot_out_of_range() {
        let err = SceneError::SlotOutOfRange { slot: 3, count: 2 };
        let msg = err.to_string();
        assert!(msg.contains('3'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn error_is_std_error() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<SceneError>();
    }
}
