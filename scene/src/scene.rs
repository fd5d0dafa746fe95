//! The scene graph and its change notification channel.

use std::collections::BTreeMap;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::component::Component;
use crate::entity::Entity;
use crate::error::{SceneError, SceneResult};
use crate::registry::ComponentRegistry;
use crate::types::{ChangeOrigin, ComponentKey, EntityId, MAX_REPLICABLE_ID};
use crate::AttributeValue;

/// What happened to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEventKind {
    EntityCreated,
    EntityRemoved,
    ComponentAdded,
    ComponentChanged,
    ComponentRemoved,
}

/// A change notification emitted on every scene mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEvent {
    pub kind: SceneEventKind,
    pub entity: EntityId,
    /// Set for component-level events.
    pub key: Option<ComponentKey>,
    /// Whether the event's subject participates in replication, captured at
    /// emission time; always `true` for entity-level events. A removed
    /// component's flags are unreachable afterwards, so observers must read
    /// them here rather than from scene state.
    pub replicated: bool,
    pub origin: ChangeOrigin,
}

/// The entity-component scene graph.
///
/// Entities are stored in ascending id order; iteration order is relied on
/// by consumers that stop at the first local-only id. Every mutation entry
/// point takes a [`ChangeOrigin`] and emits a [`SceneEvent`] to all
/// subscribers.
#[derive(Debug)]
pub struct Scene {
    registry: ComponentRegistry,
    entities: BTreeMap<EntityId, Entity>,
    next_id: u32,
    subscribers: Vec<Sender<SceneEvent>>,
}

impl Scene {
    /// Creates an empty scene over a component registry.
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            entities: BTreeMap::new(),
            next_id: 1,
            subscribers: Vec::new(),
        }
    }

    /// Returns the component registry.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Registers a subscriber for change notifications.
    ///
    /// Events are delivered on every mutation; a dropped receiver is pruned
    /// on the next emission.
    pub fn subscribe(&mut self) -> Receiver<SceneEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn emit(
        &mut self,
        kind: SceneEventKind,
        entity: EntityId,
        key: Option<ComponentKey>,
        replicated: bool,
        origin: ChangeOrigin,
    ) {
        let event = SceneEvent {
            kind,
            entity,
            key,
            replicated,
            origin,
        };
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the scene holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Looks up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns `true` if the entity exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Iterates entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Returns the next unused id in the replicable range.
    ///
    /// The allocator is monotonic and skips ids currently in use, wrapping
    /// within `1..=MAX_REPLICABLE_ID`.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::IdSpaceExhausted`] once every replicable id is
    /// in use.
    pub fn next_free_id(&mut self) -> SceneResult<EntityId> {
        let mut attempts = 0u32;
        while attempts < MAX_REPLICABLE_ID {
            if self.next_id == 0 || self.next_id > MAX_REPLICABLE_ID {
                self.next_id = 1;
            }
            let candidate = EntityId::new(self.next_id);
            self.next_id += 1;
            if !self.entities.contains_key(&candidate) {
                return Ok(candidate);
            }
            attempts += 1;
        }
        Err(SceneError::IdSpaceExhausted)
    }

    /// Creates an entity, allocating an id when none is given.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateEntity`] if the id is taken,
    /// [`SceneError::InvalidId`] for id zero, or
    /// [`SceneError::IdSpaceExhausted`] when allocation is impossible.
    pub fn create_entity(
        &mut self,
        id: Option<EntityId>,
        origin: ChangeOrigin,
    ) -> SceneResult<EntityId> {
        let id = match id {
            Some(id) if id.raw() == 0 => return Err(SceneError::InvalidId { id }),
            Some(id) => {
                if self.entities.contains_key(&id) {
                    return Err(SceneError::DuplicateEntity { id });
                }
                id
            }
            None => self.next_free_id()?,
        };
        self.entities.insert(id, Entity::new(id));
        self.bump_allocator(id);
        self.emit(SceneEventKind::EntityCreated, id, None, true, origin);
        Ok(id)
    }

    // Adopting an explicit replicable id advances the allocator past it, so
    // the next free id is always above everything seen so far.
    fn bump_allocator(&mut self, id: EntityId) {
        if id.is_replicable() && id.raw() >= self.next_id {
            self.next_id = id.raw() + 1;
        }
    }

    /// Removes an entity, returning `true` if it existed.
    pub fn remove_entity(&mut self, id: EntityId, origin: ChangeOrigin) -> bool {
        if self.entities.remove(&id).is_none() {
            return false;
        }
        self.emit(SceneEventKind::EntityRemoved, id, None, true, origin);
        true
    }

    /// Relocates an entity to a new id, atomically.
    ///
    /// Subscribers observe the move as removal of `old` followed by creation
    /// of `new`, both with the given origin.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownEntity`] if `old` is absent,
    /// [`SceneError::DuplicateEntity`] if `new` is taken, or
    /// [`SceneError::InvalidId`] for id zero.
    pub fn change_entity_id(
        &mut self,
        old: EntityId,
        new: EntityId,
        origin: ChangeOrigin,
    ) -> SceneResult<()> {
        if new.raw() == 0 {
            return Err(SceneError::InvalidId { id: new });
        }
        if self.entities.contains_key(&new) {
            return Err(SceneError::DuplicateEntity { id: new });
        }
        let mut entity = self
            .entities
            .remove(&old)
            .ok_or(SceneError::UnknownEntity { id: old })?;
        entity.set_id(new);
        self.entities.insert(new, entity);
        self.bump_allocator(new);
        self.emit(SceneEventKind::EntityRemoved, old, None, true, origin);
        self.emit(SceneEventKind::EntityCreated, new, None, true, origin);
        Ok(())
    }

    /// Returns the component if the entity and component exist.
    #[must_use]
    pub fn component(&self, entity: EntityId, key: &ComponentKey) -> Option<&Component> {
        self.entities.get(&entity)?.component(key)
    }

    /// Returns mutable component access for deserialization.
    ///
    /// Direct mutation emits nothing; callers that change state this way
    /// follow up with [`Scene::notify_component_changed`].
    #[must_use]
    pub fn component_mut(
        &mut self,
        entity: EntityId,
        key: &ComponentKey,
    ) -> Option<&mut Component> {
        self.entities.get_mut(&entity)?.component_mut(key)
    }

    /// Looks up a component by key, creating it from the registry if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownEntity`] or
    /// [`SceneError::UnknownComponentType`].
    pub fn get_or_create_component(
        &mut self,
        entity: EntityId,
        type_hash: u32,
        name: &str,
        origin: ChangeOrigin,
    ) -> SceneResult<ComponentKey> {
        if !self.entities.contains_key(&entity) {
            return Err(SceneError::UnknownEntity { id: entity });
        }
        let key = ComponentKey::new(type_hash, name);
        if self
            .entities
            .get(&entity)
            .is_some_and(|e| e.component(&key).is_some())
        {
            return Ok(key);
        }
        let component = self.registry.instantiate(type_hash, name)?;
        let replicated = component.is_replicated();
        let host = self.entities.get_mut(&entity).expect("checked above");
        host.push_component(component);
        host.mark_changed();
        self.emit(
            SceneEventKind::ComponentAdded,
            entity,
            Some(key.clone()),
            replicated,
            origin,
        );
        Ok(key)
    }

    /// Announces that a component's state changed.
    ///
    /// Used after direct mutation through [`Scene::component_mut`], e.g.
    /// when a received message has been deserialized into the component.
    pub fn notify_component_changed(
        &mut self,
        entity: EntityId,
        key: &ComponentKey,
        origin: ChangeOrigin,
    ) {
        let replicated = self
            .entities
            .get(&entity)
            .and_then(|e| e.component(key))
            .is_some_and(Component::is_replicated);
        if let Some(host) = self.entities.get_mut(&entity) {
            host.mark_changed();
        }
        self.emit(
            SceneEventKind::ComponentChanged,
            entity,
            Some(key.clone()),
            replicated,
            origin,
        );
    }

    /// Assigns one attribute, emitting `ComponentChanged`.
    ///
    /// The notification fires even when the value is unchanged; delta
    /// serialization suppresses no-op updates at flush time.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownEntity`], [`SceneError::SlotOutOfRange`],
    /// or [`SceneError::AttributeTypeMismatch`]. Unknown keys report
    /// [`SceneError::UnknownComponentType`].
    pub fn set_attribute(
        &mut self,
        entity: EntityId,
        key: &ComponentKey,
        slot: usize,
        value: AttributeValue,
        origin: ChangeOrigin,
    ) -> SceneResult<bool> {
        let host = self
            .entities
            .get_mut(&entity)
            .ok_or(SceneError::UnknownEntity { id: entity })?;
        let component = host
            .component_mut(key)
            .ok_or(SceneError::UnknownComponentType {
                type_hash: key.type_hash,
            })?;
        let changed = component.set_attribute(slot, value)?;
        let replicated = component.is_replicated();
        host.mark_changed();
        self.emit(
            SceneEventKind::ComponentChanged,
            entity,
            Some(key.clone()),
            replicated,
            origin,
        );
        Ok(changed)
    }

    /// Removes a component, returning `true` if it existed.
    ///
    /// The component's replication flags are read before it is dropped, so
    /// the `ComponentRemoved` event still reports them.
    pub fn remove_component(
        &mut self,
        entity: EntityId,
        key: &ComponentKey,
        origin: ChangeOrigin,
    ) -> bool {
        let Some(host) = self.entities.get_mut(&entity) else {
            return false;
        };
        let Some(component) = host.take_component(key) else {
            return false;
        };
        let replicated = component.is_replicated();
        host.mark_changed();
        self.emit(
            SceneEventKind::ComponentRemoved,
            entity,
            Some(key.clone()),
            replicated,
            origin,
        );
        true
    }

    /// Clears an entity's pending-change marker.
    pub fn reset_entity_change(&mut self, entity: EntityId) {
        if let Some(host) = self.entities.get_mut(&entity) {
            host.reset_change();
        }
    }
}
