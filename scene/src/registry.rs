//! Component type registry.

use std::collections::HashMap;

use crate::attribute::AttributeValue;
use crate::component::Component;
use crate::error::{SceneError, SceneResult};
use crate::types::ComponentKey;

/// A component type definition: its identity, default attribute layout, and
/// replication flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    /// Hash of the component type name; the wire identity.
    pub type_hash: u32,
    /// Human-readable type name, for diagnostics.
    pub type_name: String,
    /// Default attribute values, defining slot order and slot types.
    pub attributes: Vec<AttributeValue>,
    /// Whether the component can be serialized at all.
    pub serializable: bool,
    /// Whether the component participates in network replication.
    pub network_sync_enabled: bool,
}

impl ComponentSpec {
    /// Creates a spec with no attributes, serializable and network-synced.
    #[must_use]
    pub fn new(type_hash: u32, type_name: impl Into<String>) -> Self {
        Self {
            type_hash,
            type_name: type_name.into(),
            attributes: Vec::new(),
            serializable: true,
            network_sync_enabled: true,
        }
    }

    /// Appends a default attribute value, defining the next slot.
    #[must_use]
    pub fn attribute(mut self, default: AttributeValue) -> Self {
        self.attributes.push(default);
        self
    }

    /// Sets the serializable flag.
    #[must_use]
    pub fn serializable(mut self, serializable: bool) -> Self {
        self.serializable = serializable;
        self
    }

    /// Sets the network sync flag.
    #[must_use]
    pub fn network_sync(mut self, enabled: bool) -> Self {
        self.network_sync_enabled = enabled;
        self
    }
}

/// Maps component type hashes to their specs.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    specs: HashMap<u32, ComponentSpec>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component spec.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateComponentType`] if the type hash is
    /// already registered.
    pub fn register(&mut self, spec: ComponentSpec) -> SceneResult<()> {
        if self.specs.contains_key(&spec.type_hash) {
            return Err(SceneError::DuplicateComponentType {
                type_hash: spec.type_hash,
            });
        }
        self.specs.insert(spec.type_hash, spec);
        Ok(())
    }

    /// Looks up a spec by type hash.
    #[must_use]
    pub fn spec(&self, type_hash: u32) -> Option<&ComponentSpec> {
        self.specs.get(&type_hash)
    }

    /// Instantiates a component of the given type with default attributes.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownComponentType`] for unregistered hashes.
    pub fn instantiate(&self, type_hash: u32, name: &str) -> SceneResult<Component> {
        let spec = self
            .specs
            .get(&type_hash)
            .ok_or(SceneError::UnknownComponentType { type_hash })?;
        Ok(Component::from_spec(
            ComponentKey::new(type_hash, name),
            spec,
        ))
    }
}
