//! Entities: ordered component collections.

use crate::component::Component;
use crate::types::{ComponentKey, EntityId};

/// A node in the scene graph: an id and an ordered collection of components.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    components: Vec<Component>,
    changed: bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            components: Vec::new(),
            changed: false,
        }
    }

    /// Returns the entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Returns the components in attach order.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Looks up a component by key.
    #[must_use]
    pub fn component(&self, key: &ComponentKey) -> Option<&Component> {
        self.components.iter().find(|c| c.key() == key)
    }

    /// Looks up a component by type hash and name.
    #[must_use]
    pub fn component_by(&self, type_hash: u32, name: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| c.key().type_hash == type_hash && c.key().name == name)
    }

    pub(crate) fn component_mut(&mut self, key: &ComponentKey) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.key() == key)
    }

    pub(crate) fn push_component(&mut self, component: Component) {
        self.components.push(component);
    }

    pub(crate) fn take_component(&mut self, key: &ComponentKey) -> Option<Component> {
        let index = self.components.iter().position(|c| c.key() == key)?;
        Some(self.components.remove(index))
    }

    /// Whether the entity carries unacknowledged local changes.
    ///
    /// The marker is informational, for host-side observers; replication
    /// tracks its own per-peer state.
    #[must_use]
    pub const fn has_pending_change(&self) -> bool {
        self.changed
    }

    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    /// Clears the pending-change marker.
    pub fn reset_change(&mut self) {
        self.changed = false;
    }
}
