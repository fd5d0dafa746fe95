//! Core identifier types for the scene graph.

/// Bit marking an entity as local-only (never replicated).
pub const LOCAL_ENTITY_BIT: u32 = 0x8000_0000;

/// Largest replicable entity id.
pub const MAX_REPLICABLE_ID: u32 = LOCAL_ENTITY_BIT - 1;

/// A scene entity identifier.
///
/// Ids with the high bit set are local-only: they are never advertised to
/// any peer and are never accepted from the network. Id zero is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an entity id from its raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` if the local-only bit is set.
    #[must_use]
    pub const fn is_local(self) -> bool {
        self.0 & LOCAL_ENTITY_BIT != 0
    }

    /// Returns `true` if the id may be replicated to peers.
    #[must_use]
    pub const fn is_replicable(self) -> bool {
        self.0 != 0 && !self.is_local()
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<EntityId> for u32 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Who caused a scene mutation.
///
/// The origin tag is the cycle-breaker between the scene and the replication
/// engine: only `Local` mutations of replicable entities are forwarded to
/// peers. There is no default origin; every mutation entry point takes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeOrigin {
    /// A user, script, or world action on this host.
    Local,
    /// A change applied from a received message.
    Network,
    /// A user or script action that must not replicate.
    LocalOnly,
    /// An internal change, not replicated.
    Disconnected,
}

impl ChangeOrigin {
    /// Returns `true` if mutations with this origin are candidates for
    /// replication.
    #[must_use]
    pub const fn replicates(self) -> bool {
        matches!(self, Self::Local)
    }
}

/// The identity of a component within its entity, and on the wire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentKey {
    /// Hash of the component type name.
    pub type_hash: u32,
    /// Instance name, distinguishing multiple components of one type.
    pub name: String,
}

impl ComponentKey {
    /// Creates a component key.
    #[must_use]
    pub fn new(type_hash: u32, name: impl Into<String>) -> Self {
        Self {
            type_hash,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_local_bit() {
        assert!(EntityId::new(0x8000_0005).is_local());
        assert!(!EntityId::new(5).is_local());
        assert!(EntityId::new(0xFFFF_FFFF).is_local());
    }

    #[test]
    fn entity_id_replicable() {
        assert!(EntityId::new(1).is_replicable());
        assert!(EntityId::new(MAX_REPLICABLE_ID).is_replicable());
        assert!(!EntityId::new(0).is_replicable());
        assert!(!EntityId::new(LOCAL_ENTITY_BIT).is_replicable());
    }

    #[test]
    fn entity_id_ordering() {
        assert!(EntityId::new(1) < EntityId::new(2));
        assert!(EntityId::new(MAX_REPLICABLE_ID) < EntityId::new(LOCAL_ENTITY_BIT));
    }

    #[test]
    fn entity_id_conversions() {
        let id: EntityId = 7u32.into();
        assert_eq!(id.raw(), 7);
        let raw: u32 = id.into();
        assert_eq!(raw, 7);
    }

    #[test]
    fn origin_replicates_only_local() {
        assert!(ChangeOrigin::Local.replicates());
        assert!(!ChangeOrigin::Network.replicates());
        assert!(!ChangeOrigin::LocalOnly.replicates());
        assert!(!ChangeOrigin::Disconnected.replicates());
    }

    #[test]
    fn component_key_identity() {
        let a = ComponentKey::new(0xAB, "T");
        let b = ComponentKey::new(0xAB, "T");
        let c = ComponentKey::new(0xAB, "U");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn component_key_ordering_is_stable() {
        let mut keys = vec![
            ComponentKey::new(2, "b"),
            ComponentKey::new(1, "z"),
            ComponentKey::new(2, "a"),
        ];
        keys.sort();
        assert_eq!(keys[0].type_hash, 1);
        assert_eq!(keys[1].name, "a");
    }
}
