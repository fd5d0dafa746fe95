//! The replication engine: scene observation, tick/flush, and intake.

use bytestream::{Deserializer, Serializer};
use crossbeam_channel::Receiver;
use log::{debug, error, warn};
use repstate::PeerSyncState;
use scene::{
    ChangeOrigin, ComponentKey, EntityId, Scene, SceneEvent, SceneEventKind,
};
use wire::{
    decode_message, encode_message, ComponentFull, ComponentRef, SyncMessage, WireLimits,
};

use crate::config::SyncConfig;
use crate::peer::{PeerDirectory, PeerId};
use crate::transport::Transport;

/// Peer id a client engine uses for its server connection.
pub const SERVER_PEER: PeerId = PeerId(0);

/// Which side of the connection this engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    /// Authoritative host: replicates to every authenticated peer and
    /// re-broadcasts accepted client changes.
    Server,
    /// Remote participant: tracks a single server and trusts it.
    Client,
}

/// Drives bidirectional replication of a [`Scene`] over a reliable
/// transport.
///
/// The engine owns the scene; hosts mutate it through
/// [`SyncManager::scene_mut`] and call [`SyncManager::tick`] once per frame.
/// Incoming transport bytes are handed to [`SyncManager::handle_message`].
/// Everything runs on the caller's thread.
#[derive(Debug)]
pub struct SyncManager {
    role: SyncRole,
    config: SyncConfig,
    wire_limits: WireLimits,
    scene: Scene,
    events: Receiver<SceneEvent>,
    peers: PeerDirectory,
    server_state: PeerSyncState,
    accumulator: f64,
}

impl SyncManager {
    /// Creates an engine bound to a scene.
    #[must_use]
    pub fn new(role: SyncRole, mut scene: Scene, config: SyncConfig) -> Self {
        let events = scene.subscribe();
        Self {
            role,
            config,
            wire_limits: WireLimits::default(),
            scene,
            events,
            peers: PeerDirectory::new(),
            server_state: PeerSyncState::new(),
            accumulator: 0.0,
        }
    }

    /// Returns the engine's role.
    #[must_use]
    pub const fn role(&self) -> SyncRole {
        self.role
    }

    /// Returns the scene.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Returns the scene for host mutation.
    ///
    /// Changes made here are picked up at the next tick.
    #[must_use]
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// Sets the seconds between flushes, clamped to the 100 Hz ceiling.
    pub fn set_update_period(&mut self, period: f64) {
        self.config.set_update_period(period);
    }

    /// Returns the effective configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Replaces the wire decode limits.
    pub fn set_wire_limits(&mut self, limits: WireLimits) {
        self.wire_limits = limits;
    }

    /// Returns a server peer's replication state.
    #[must_use]
    pub fn peer_state(&self, peer: PeerId) -> Option<&PeerSyncState> {
        self.peers.get(peer)?.state.as_ref()
    }

    /// Returns the client's server-tracking replication state.
    #[must_use]
    pub fn server_state(&self) -> &PeerSyncState {
        &self.server_state
    }

    /// Registers a newly connected peer (server role).
    pub fn on_peer_connected(&mut self, peer: PeerId) {
        if self.role == SyncRole::Server {
            self.peers.insert(peer);
            debug!("peer {} connected", peer.raw());
        }
    }

    /// Marks a peer authenticated and schedules the full scene for it.
    ///
    /// Replicable entities are walked in ascending id order; the walk stops
    /// at the first local-only id, which terminates the replicable range.
    pub fn on_peer_authenticated(&mut self, peer: PeerId) {
        if self.role != SyncRole::Server {
            return;
        }
        let mut state = PeerSyncState::new();
        for entity in self.scene.entities() {
            if entity.id().is_local() {
                break;
            }
            state.on_entity_changed(entity.id());
        }
        let record = self.peers.insert(peer);
        record.authenticated = true;
        record.state = Some(state);
        debug!("peer {} authenticated", peer.raw());
    }

    /// Drops a disconnected peer and all of its replication state.
    pub fn on_peer_disconnected(&mut self, peer: PeerId) {
        match self.role {
            SyncRole::Server => {
                self.peers.remove(peer);
            }
            SyncRole::Client => {
                self.server_state.clear();
            }
        }
        debug!("peer {} disconnected", peer.raw());
    }

    /// Advances the engine by one frame.
    ///
    /// Pending scene changes are folded into per-peer state first. The
    /// accumulator then decides whether to flush: crossing the update period
    /// triggers exactly one flush, even when several periods elapsed.
    pub fn tick<T: Transport>(&mut self, frame_dt: f64, transport: &mut T) {
        self.pump_events(None);

        self.accumulator += frame_dt;
        if self.accumulator < self.config.update_period() {
            return;
        }
        while self.accumulator >= self.config.update_period() {
            self.accumulator -= self.config.update_period();
        }

        self.flush(transport);
    }

    /// Applies one received message.
    ///
    /// Never panics and never drops the peer: undecodable or invalid
    /// messages are logged and discarded, and a corrupt component body only
    /// skips that component.
    pub fn handle_message<T: Transport>(
        &mut self,
        source: PeerId,
        bytes: &[u8],
        transport: &mut T,
    ) {
        // Host mutations still queued belong to every peer; fold them in
        // before this message's own events enter the queue.
        self.pump_events(None);

        let message = match decode_message(bytes, &self.wire_limits) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    "discarding undecodable message from peer {}: {e}",
                    source.raw()
                );
                return;
            }
        };

        let entity_id = EntityId::new(message.entity_id());
        if !self.validate(source, entity_id) {
            return;
        }

        match message {
            SyncMessage::CreateEntity { components, .. } => {
                self.handle_create_entity(source, entity_id, components, transport);
            }
            SyncMessage::RemoveEntity { .. } => {
                self.handle_remove_entity(source, entity_id);
            }
            SyncMessage::CreateComponents { components, .. } => {
                self.handle_components(source, entity_id, components, BodyEncoding::Full);
            }
            SyncMessage::UpdateComponents { components, .. } => {
                self.handle_components(source, entity_id, components, BodyEncoding::Delta);
            }
            SyncMessage::RemoveComponents { components, .. } => {
                self.handle_remove_components(source, entity_id, components);
            }
            SyncMessage::EntityIdCollision {
                old_entity_id,
                new_entity_id,
            } => {
                self.handle_id_collision(
                    EntityId::new(old_entity_id),
                    EntityId::new(new_entity_id),
                );
            }
        }
    }

    /// Origin used when applying incoming changes: the server re-replicates
    /// them, the client applies them quietly.
    const fn apply_origin(&self) -> ChangeOrigin {
        match self.role {
            SyncRole::Server => ChangeOrigin::Local,
            SyncRole::Client => ChangeOrigin::Network,
        }
    }

    fn validate(&self, source: PeerId, entity_id: EntityId) -> bool {
        if entity_id.is_local() {
            warn!(
                "received a sync message for local-only entity {:#010X}, disregarding",
                entity_id.raw()
            );
            return false;
        }
        if entity_id.raw() == 0 {
            warn!("received a sync message for entity id zero, disregarding");
            return false;
        }
        // Scene state from the server is always trusted.
        if self.role == SyncRole::Client {
            return true;
        }
        let authenticated = self
            .peers
            .get(source)
            .is_some_and(|peer| peer.authenticated);
        if !authenticated {
            warn!(
                "sync message from unknown or unauthenticated peer {}, disregarding",
                source.raw()
            );
        }
        authenticated
    }

    fn source_state_mut(&mut self, source: PeerId) -> Option<&mut PeerSyncState> {
        match self.role {
            SyncRole::Server => self.peers.get_mut(source)?.state.as_mut(),
            SyncRole::Client => Some(&mut self.server_state),
        }
    }

    fn pump_events(&mut self, exclude: Option<PeerId>) {
        let events: Vec<SceneEvent> = self.events.try_iter().collect();
        for event in events {
            self.apply_event(&event, exclude);
        }
    }

    fn apply_event(&mut self, event: &SceneEvent, exclude: Option<PeerId>) {
        // Only local mutations of replicable entities leave this host. The
        // replication flag was captured when the event was emitted; for a
        // removal the component's flags are no longer in the scene at all.
        if !event.origin.replicates() || !event.entity.is_replicable() || !event.replicated {
            return;
        }

        match self.role {
            SyncRole::Server => {
                for peer in self.peers.iter_mut() {
                    if exclude == Some(peer.id) || !peer.authenticated {
                        continue;
                    }
                    if let Some(state) = peer.state.as_mut() {
                        route_event(state, event);
                    }
                }
            }
            SyncRole::Client => route_event(&mut self.server_state, event),
        }
    }

    fn flush<T: Transport>(&mut self, transport: &mut T) {
        let scene = &self.scene;
        let limits = &self.wire_limits;
        match self.role {
            SyncRole::Server => {
                for peer in self.peers.iter_mut() {
                    if !peer.authenticated {
                        continue;
                    }
                    if let Some(state) = peer.state.as_mut() {
                        flush_peer(scene, state, peer.id, limits, transport);
                    }
                }
            }
            SyncRole::Client => {
                flush_peer(scene, &mut self.server_state, SERVER_PEER, limits, transport);
            }
        }
    }

    fn handle_create_entity<T: Transport>(
        &mut self,
        source: PeerId,
        requested_id: EntityId,
        components: Vec<ComponentFull>,
        transport: &mut T,
    ) {
        let origin = self.apply_origin();
        let mut entity_id = requested_id;

        match self.role {
            SyncRole::Server => {
                if self.scene.contains(entity_id) {
                    // The requested id is taken; move the creator to a fresh
                    // one and keep going under it.
                    let new_id = match self.scene.next_free_id() {
                        Ok(id) => id,
                        Err(e) => {
                            warn!(
                                "cannot resolve id collision for entity {}: {e}",
                                entity_id.raw()
                            );
                            return;
                        }
                    };
                    send_message(
                        transport,
                        source,
                        &SyncMessage::EntityIdCollision {
                            old_entity_id: entity_id.raw(),
                            new_entity_id: new_id.raw(),
                        },
                        &self.wire_limits,
                    );
                    entity_id = new_id;
                }
            }
            SyncRole::Client => {
                if self.scene.contains(entity_id) {
                    debug!(
                        "entity {} from server already exists, removing the old one",
                        entity_id.raw()
                    );
                    self.scene.remove_entity(entity_id, ChangeOrigin::Network);
                    if let Some(state) = self.source_state_mut(source) {
                        state.ack_dirty_entity(entity_id);
                        state.forget_entity(entity_id);
                    }
                }
            }
        }

        if let Err(e) = self.scene.create_entity(Some(entity_id), origin) {
            warn!("scene refused to create entity {}: {e}", entity_id.raw());
            return;
        }

        let mut applied: Vec<(ComponentKey, Vec<u8>)> = Vec::new();
        for component in components {
            let key = match self.scene.get_or_create_component(
                entity_id,
                component.type_hash,
                &component.name,
                origin,
            ) {
                Ok(key) => key,
                Err(e) => {
                    warn!("could not create component: {e}");
                    continue;
                }
            };
            if component.data.is_empty() {
                applied.push((key, Vec::new()));
                continue;
            }
            let Some(target) = self.scene.component_mut(entity_id, &key) else {
                continue;
            };
            let mut de = Deserializer::new(&component.data);
            match target.read_full(&mut de) {
                Ok(()) => applied.push((key, component.data)),
                Err(e) => {
                    error!(
                        "error deserializing component 0x{:08X} \"{}\": {e}",
                        component.type_hash, component.name
                    );
                }
            }
        }

        // Reflect the accepted state into the sender's own record so the
        // next flush treats the entity as already known to it.
        if let Some(state) = self.source_state_mut(source) {
            let record = state.get_or_create_entity(entity_id);
            for (key, shadow) in &applied {
                if !shadow.is_empty() {
                    record.set_shadow(key.clone(), shadow.clone());
                }
            }
        }

        for (key, _) in &applied {
            self.scene.notify_component_changed(entity_id, key, origin);
        }
        if origin == ChangeOrigin::Network {
            self.scene.reset_entity_change(entity_id);
        }

        self.pump_events(Some(source));
    }

    fn handle_remove_entity(&mut self, source: PeerId, entity_id: EntityId) {
        let origin = self.apply_origin();
        if !self.scene.remove_entity(entity_id, origin) {
            return;
        }
        if let Some(state) = self.source_state_mut(source) {
            // The sender already forgot the entity; do not echo the removal.
            state.ack_dirty_entity(entity_id);
            state.ack_removed_entity(entity_id);
            state.forget_entity(entity_id);
        }
        self.pump_events(Some(source));
    }

    fn handle_components(
        &mut self,
        source: PeerId,
        entity_id: EntityId,
        components: Vec<ComponentFull>,
        encoding: BodyEncoding,
    ) {
        let origin = self.apply_origin();

        if !self.scene.contains(entity_id) {
            // Tolerated recovery: the create must have been lost to an
            // earlier decode failure. Rebuild the entity and continue.
            warn!(
                "entity {} not found for component message, creating it now",
                entity_id.raw()
            );
            if let Err(e) = self.scene.create_entity(Some(entity_id), origin) {
                warn!("scene refused to create entity {}: {e}", entity_id.raw());
                return;
            }
            if let Some(state) = self.source_state_mut(source) {
                state.get_or_create_entity(entity_id);
            }
        }

        // (key, refreshed shadow bytes, whether observers should hear of it)
        let mut applied: Vec<(ComponentKey, Vec<u8>, bool)> = Vec::new();
        for component in components {
            let key = match self.scene.get_or_create_component(
                entity_id,
                component.type_hash,
                &component.name,
                origin,
            ) {
                Ok(key) => key,
                Err(e) => {
                    warn!("could not create component: {e}");
                    continue;
                }
            };
            if component.data.is_empty() {
                continue;
            }
            let Some(target) = self.scene.component_mut(entity_id, &key) else {
                continue;
            };
            let mut de = Deserializer::new(&component.data);
            let outcome = match encoding {
                BodyEncoding::Full => target.read_full(&mut de).map(|()| true),
                BodyEncoding::Delta => target.read_delta(&mut de),
            };
            match outcome {
                Ok(changed) => {
                    let shadow = match encoding {
                        // Full bodies are the canonical bytes already.
                        BodyEncoding::Full => component.data,
                        // After a delta the baseline must be refreshed from
                        // live state; canonical serialization makes this
                        // byte-identical to the sender's next baseline.
                        BodyEncoding::Delta => {
                            let target = self
                                .scene
                                .component(entity_id, &key)
                                .expect("component exists, it was just written");
                            match target.full_bytes(self.wire_limits.max_data_len) {
                                Ok(bytes) => bytes,
                                Err(e) => {
                                    error!("error refreshing component baseline: {e}");
                                    continue;
                                }
                            }
                        }
                    };
                    applied.push((key, shadow, changed));
                }
                Err(e) => {
                    error!(
                        "error deserializing component 0x{:08X} \"{}\": {e}",
                        component.type_hash, component.name
                    );
                }
            }
        }

        if let Some(state) = self.source_state_mut(source) {
            let record = state.get_or_create_entity(entity_id);
            for (key, shadow, _) in &applied {
                record.set_shadow(key.clone(), shadow.clone());
            }
        }

        let mut notified = false;
        for (key, _, changed) in &applied {
            if *changed {
                self.scene.notify_component_changed(entity_id, key, origin);
                notified = true;
            }
        }
        if notified && origin == ChangeOrigin::Network {
            self.scene.reset_entity_change(entity_id);
        }

        self.pump_events(Some(source));
    }

    fn handle_remove_components(
        &mut self,
        source: PeerId,
        entity_id: EntityId,
        components: Vec<ComponentRef>,
    ) {
        let origin = self.apply_origin();
        if !self.scene.contains(entity_id) {
            return;
        }
        for component in components {
            let key = ComponentKey::new(component.type_hash, component.name);
            self.scene.remove_component(entity_id, &key, origin);
            if let Some(state) = self.source_state_mut(source) {
                if let Some(record) = state.get_entity_mut(entity_id) {
                    record.remove_shadow(&key);
                    record.ack_dirty(&key);
                    record.ack_removed(&key);
                }
            }
        }
        self.pump_events(Some(source));
    }

    fn handle_id_collision(&mut self, old: EntityId, new: EntityId) {
        if self.role == SyncRole::Server {
            warn!("received EntityIdCollision from a client, disregarding");
            return;
        }
        debug!(
            "entity id collision: entity {} became {}",
            old.raw(),
            new.raw()
        );
        if let Err(e) = self.scene.change_entity_id(old, new, ChangeOrigin::Network) {
            warn!("could not relocate entity {}: {e}", old.raw());
            return;
        }
        // Pending marks and shadows follow the entity to its new id.
        self.server_state.relocate_entity(old, new);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyEncoding {
    Full,
    Delta,
}

fn route_event(state: &mut PeerSyncState, event: &SceneEvent) {
    match event.kind {
        SceneEventKind::EntityCreated => state.on_entity_changed(event.entity),
        SceneEventKind::EntityRemoved => state.on_entity_removed(event.entity),
        SceneEventKind::ComponentAdded | SceneEventKind::ComponentChanged => {
            if let Some(key) = &event.key {
                state.on_component_changed(event.entity, key.clone());
            } else {
                state.on_entity_changed(event.entity);
            }
        }
        SceneEventKind::ComponentRemoved => {
            if let Some(key) = &event.key {
                state.on_component_removed(event.entity, key.clone());
            }
        }
    }
}

/// Turns one peer's pending state into outgoing messages.
///
/// Per entity the order is `CreateEntity`, or `CreateComponents` then
/// `UpdateComponents` then `RemoveComponents`; entity removals go out after
/// all dirty work. Every mark is acknowledged as it is acted on.
fn flush_peer<T: Transport>(
    scene: &Scene,
    state: &mut PeerSyncState,
    peer: PeerId,
    limits: &WireLimits,
    transport: &mut T,
) {
    let dirty: Vec<EntityId> = state.dirty_entities().collect();
    for entity_id in dirty {
        let Some(entity) = scene.entity(entity_id) else {
            // Removed since it was marked; the removal set covers it.
            state.ack_dirty_entity(entity_id);
            continue;
        };

        if !state.knows_entity(entity_id) {
            // Never seen by this peer: send full state.
            let record = state.get_or_create_entity(entity_id);
            let mut components = Vec::new();
            for component in entity.components() {
                if !component.is_replicated() {
                    continue;
                }
                match component.full_bytes(limits.max_data_len) {
                    Ok(bytes) => {
                        if !bytes.is_empty() {
                            record.set_shadow(component.key().clone(), bytes.clone());
                            components.push(ComponentFull {
                                type_hash: component.key().type_hash,
                                name: component.key().name.clone(),
                                data: bytes,
                            });
                        }
                    }
                    Err(e) => {
                        error!(
                            "error serializing component 0x{:08X} \"{}\": {e}",
                            component.key().type_hash,
                            component.key().name
                        );
                    }
                }
                record.ack_dirty(component.key());
            }
            send_message(
                transport,
                peer,
                &SyncMessage::CreateEntity {
                    entity_id: entity_id.raw(),
                    components,
                },
                limits,
            );
        } else {
            let record = state
                .get_entity_mut(entity_id)
                .expect("record exists, knows_entity was true");

            let mut created = Vec::new();
            let mut updated = Vec::new();
            let dirty_components: Vec<ComponentKey> =
                record.dirty_components().cloned().collect();
            for key in dirty_components {
                if let Some(component) = entity.component(&key) {
                    if component.is_replicated() {
                        let baseline = record.shadow(&key).filter(|b| !b.is_empty());
                        match baseline {
                            None => {
                                // No baseline yet: full state into CreateComponents.
                                match component.full_bytes(limits.max_data_len) {
                                    Ok(bytes) => {
                                        if !bytes.is_empty() {
                                            record.set_shadow(key.clone(), bytes.clone());
                                            created.push(ComponentFull {
                                                type_hash: key.type_hash,
                                                name: key.name.clone(),
                                                data: bytes,
                                            });
                                        }
                                    }
                                    Err(e) => {
                                        error!(
                                            "error serializing component 0x{:08X} \"{}\": {e}",
                                            key.type_hash, key.name
                                        );
                                    }
                                }
                            }
                            Some(baseline) => {
                                let mut ser = Serializer::new(limits.max_data_len);
                                let mut prev = Deserializer::new(baseline);
                                match component.write_delta(&mut ser, &mut prev) {
                                    Ok(true) => {
                                        let delta = ser.finish();
                                        match component.full_bytes(limits.max_data_len) {
                                            Ok(full) => {
                                                record.set_shadow(key.clone(), full);
                                                updated.push(ComponentFull {
                                                    type_hash: key.type_hash,
                                                    name: key.name.clone(),
                                                    data: delta,
                                                });
                                            }
                                            Err(e) => {
                                                error!(
                                                    "error serializing component 0x{:08X} \"{}\": {e}",
                                                    key.type_hash, key.name
                                                );
                                            }
                                        }
                                    }
                                    // Nothing changed against this peer's
                                    // baseline: the component is omitted.
                                    Ok(false) => {}
                                    Err(e) => {
                                        error!(
                                            "error delta-serializing component 0x{:08X} \"{}\": {e}",
                                            key.type_hash, key.name
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
                record.ack_dirty(&key);
            }

            if !created.is_empty() {
                send_message(
                    transport,
                    peer,
                    &SyncMessage::CreateComponents {
                        entity_id: entity_id.raw(),
                        components: created,
                    },
                    limits,
                );
            }
            if !updated.is_empty() {
                send_message(
                    transport,
                    peer,
                    &SyncMessage::UpdateComponents {
                        entity_id: entity_id.raw(),
                        components: updated,
                    },
                    limits,
                );
            }

            let removed_components: Vec<ComponentKey> =
                record.removed_components().cloned().collect();
            if !removed_components.is_empty() {
                let mut refs = Vec::new();
                for key in removed_components {
                    record.remove_shadow(&key);
                    record.ack_removed(&key);
                    refs.push(ComponentRef {
                        type_hash: key.type_hash,
                        name: key.name,
                    });
                }
                send_message(
                    transport,
                    peer,
                    &SyncMessage::RemoveComponents {
                        entity_id: entity_id.raw(),
                        components: refs,
                    },
                    limits,
                );
            }
        }

        state.ack_dirty_entity(entity_id);
    }

    let removed: Vec<EntityId> = state.removed_entities().collect();
    for entity_id in removed {
        send_message(
            transport,
            peer,
            &SyncMessage::RemoveEntity {
                entity_id: entity_id.raw(),
            },
            limits,
        );
        state.forget_entity(entity_id);
        state.ack_removed_entity(entity_id);
    }
}

fn send_message<T: Transport>(
    transport: &mut T,
    peer: PeerId,
    message: &SyncMessage,
    limits: &WireLimits,
) {
    match encode_message(message, limits) {
        Ok(bytes) => transport.send(peer, &bytes),
        Err(e) => error!("failed to encode {:?} message: {e}", message.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingTransport;
    use scene::{AttributeValue, ComponentRegistry, ComponentSpec};

    const TYPE_HASH: u32 = 0xAB;

    fn test_scene() -> Scene {
        let mut registry = ComponentRegistry::new();
        registry
            .register(
                ComponentSpec::new(TYPE_HASH, "Test").attribute(AttributeValue::U32(0)),
            )
            .unwrap();
        Scene::new(registry)
    }

    fn server() -> SyncManager {
        SyncManager::new(SyncRole::Server, test_scene(), SyncConfig::default())
    }

    fn decoded(transport: &RecordingTransport) -> Vec<SyncMessage> {
        transport
            .sent()
            .iter()
            .map(|(_, bytes)| decode_message(bytes, &WireLimits::default()).unwrap())
            .collect()
    }

    #[test]
    fn update_period_clamped_at_floor() {
        let mut engine = server();
        engine.set_update_period(0.001);
        assert_eq!(engine.config().update_period(), 0.01);
    }

    #[test]
    fn frame_spanning_many_periods_flushes_once() {
        let mut engine = server();
        let mut transport = RecordingTransport::new();
        engine.on_peer_connected(PeerId(1));
        engine.on_peer_authenticated(PeerId(1));

        engine
            .scene_mut()
            .create_entity(Some(EntityId::new(5)), ChangeOrigin::Local)
            .unwrap();

        // 10 periods in one frame: still exactly one CreateEntity.
        engine.tick(0.4, &mut transport);
        assert_eq!(decoded(&transport).len(), 1);

        // Accumulator was fully drained modulo the period.
        transport.take();
        engine.tick(0.039, &mut transport);
        assert!(transport.is_empty());
    }

    #[test]
    fn no_flush_before_period_crossed() {
        let mut engine = server();
        let mut transport = RecordingTransport::new();
        engine.on_peer_connected(PeerId(1));
        engine.on_peer_authenticated(PeerId(1));
        engine
            .scene_mut()
            .create_entity(None, ChangeOrigin::Local)
            .unwrap();

        engine.tick(0.01, &mut transport);
        assert!(transport.is_empty());
        engine.tick(0.01, &mut transport);
        assert!(transport.is_empty());
        engine.tick(0.025, &mut transport);
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn onboarding_marks_existing_entities() {
        let mut engine = server();
        engine
            .scene_mut()
            .create_entity(Some(EntityId::new(1)), ChangeOrigin::Local)
            .unwrap();
        engine
            .scene_mut()
            .create_entity(Some(EntityId::new(2)), ChangeOrigin::Local)
            .unwrap();
        engine
            .scene_mut()
            .create_entity(Some(EntityId::new(0x8000_0001)), ChangeOrigin::LocalOnly)
            .unwrap();

        // Drain creation events first; onboarding must find entities itself.
        let mut transport = RecordingTransport::new();
        engine.tick(0.04, &mut transport);

        engine.on_peer_connected(PeerId(7));
        engine.on_peer_authenticated(PeerId(7));
        let state = engine.peer_state(PeerId(7)).unwrap();
        let dirty: Vec<u32> = state.dirty_entities().map(EntityId::raw).collect();
        assert_eq!(dirty, vec![1, 2]);
    }

    #[test]
    fn local_only_entities_never_marked() {
        let mut engine = server();
        let mut transport = RecordingTransport::new();
        engine.on_peer_connected(PeerId(1));
        engine.on_peer_authenticated(PeerId(1));

        engine
            .scene_mut()
            .create_entity(Some(EntityId::new(0x8000_0005)), ChangeOrigin::Local)
            .unwrap();
        for _ in 0..5 {
            engine.tick(0.04, &mut transport);
        }

        assert!(transport.is_empty());
        assert!(engine.peer_state(PeerId(1)).unwrap().is_clean());
    }

    #[test]
    fn local_only_origin_never_replicates() {
        let mut engine = server();
        let mut transport = RecordingTransport::new();
        engine.on_peer_connected(PeerId(1));
        engine.on_peer_authenticated(PeerId(1));

        engine
            .scene_mut()
            .create_entity(Some(EntityId::new(5)), ChangeOrigin::LocalOnly)
            .unwrap();
        engine.tick(0.04, &mut transport);
        assert!(transport.is_empty());
    }

    #[test]
    fn unauthenticated_peer_receives_nothing() {
        let mut engine = server();
        let mut transport = RecordingTransport::new();
        engine.on_peer_connected(PeerId(1));

        engine
            .scene_mut()
            .create_entity(None, ChangeOrigin::Local)
            .unwrap();
        engine.tick(0.04, &mut transport);
        assert!(transport.is_empty());
    }

    #[test]
    fn unauthenticated_sender_is_rejected() {
        let mut engine = server();
        let mut transport = RecordingTransport::new();
        engine.on_peer_connected(PeerId(1));

        let bytes = encode_message(
            &SyncMessage::CreateEntity {
                entity_id: 9,
                components: Vec::new(),
            },
            &WireLimits::default(),
        )
        .unwrap();
        engine.handle_message(PeerId(1), &bytes, &mut transport);

        assert!(engine.scene().is_empty());
        assert!(transport.is_empty());
    }

    #[test]
    fn garbage_bytes_are_discarded() {
        let mut engine = server();
        let mut transport = RecordingTransport::new();
        engine.on_peer_connected(PeerId(1));
        engine.on_peer_authenticated(PeerId(1));

        engine.handle_message(PeerId(1), &[0xFF, 1, 2, 3], &mut transport);
        engine.handle_message(PeerId(1), &[], &mut transport);

        assert!(engine.scene().is_empty());
    }

    #[test]
    fn server_rejects_collision_message() {
        let mut engine = server();
        let mut transport = RecordingTransport::new();
        engine.on_peer_connected(PeerId(1));
        engine.on_peer_authenticated(PeerId(1));
        engine
            .scene_mut()
            .create_entity(Some(EntityId::new(50)), ChangeOrigin::Local)
            .unwrap();

        let bytes = encode_message(
            &SyncMessage::EntityIdCollision {
                old_entity_id: 50,
                new_entity_id: 51,
            },
            &WireLimits::default(),
        )
        .unwrap();
        engine.handle_message(PeerId(1), &bytes, &mut transport);

        assert!(engine.scene().contains(EntityId::new(50)));
        assert!(!engine.scene().contains(EntityId::new(51)));
    }

    #[test]
    fn disconnect_drops_peer_state() {
        let mut engine = server();
        engine.on_peer_connected(PeerId(1));
        engine.on_peer_authenticated(PeerId(1));
        assert!(engine.peer_state(PeerId(1)).is_some());

        engine.on_peer_disconnected(PeerId(1));
        assert!(engine.peer_state(PeerId(1)).is_none());
    }
}
