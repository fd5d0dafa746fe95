//! Components and their full/delta serialization.

use bytestream::{Deserializer, Serializer, StreamError, StreamResult};

use crate::attribute::AttributeValue;
use crate::error::{SceneError, SceneResult};
use crate::registry::ComponentSpec;
use crate::types::ComponentKey;

/// A typed, named datum attached to an entity; the unit of replication.
///
/// Attribute slots are fixed at instantiation from the component's spec.
/// Serialization is canonical: a full encoding is the u16 slot count followed
/// by the tagged values in slot order, so two hosts holding equal state
/// produce identical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    key: ComponentKey,
    serializable: bool,
    network_sync_enabled: bool,
    attributes: Vec<AttributeValue>,
}

impl Component {
    pub(crate) fn from_spec(key: ComponentKey, spec: &ComponentSpec) -> Self {
        Self {
            key,
            serializable: spec.serializable,
            network_sync_enabled: spec.network_sync_enabled,
            attributes: spec.attributes.clone(),
        }
    }

    /// Returns the component's identity.
    #[must_use]
    pub fn key(&self) -> &ComponentKey {
        &self.key
    }

    pub(crate) fn set_key(&mut self, key: ComponentKey) {
        self.key = key;
    }

    /// Whether the component can be serialized at all.
    #[must_use]
    pub const fn is_serializable(&self) -> bool {
        self.serializable
    }

    /// Whether the component participates in network replication.
    #[must_use]
    pub const fn is_network_sync_enabled(&self) -> bool {
        self.network_sync_enabled
    }

    /// Whether the component is serializable and network-synced.
    #[must_use]
    pub const fn is_replicated(&self) -> bool {
        self.serializable && self.network_sync_enabled
    }

    /// Returns the attribute slots.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeValue] {
        &self.attributes
    }

    /// Returns the attribute at `slot`.
    #[must_use]
    pub fn attribute(&self, slot: usize) -> Option<&AttributeValue> {
        self.attributes.get(slot)
    }

    /// Assigns the attribute at `slot`, returning whether the value changed.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::SlotOutOfRange`] or
    /// [`SceneError::AttributeTypeMismatch`].
    pub fn set_attribute(&mut self, slot: usize, value: AttributeValue) -> SceneResult<bool> {
        let count = self.attributes.len();
        let current = self
            .attributes
            .get_mut(slot)
            .ok_or(SceneError::SlotOutOfRange { slot, count })?;
        if current.tag() != value.tag() {
            return Err(SceneError::AttributeTypeMismatch { slot });
        }
        let changed = !current.same_value(&value);
        *current = value;
        Ok(changed)
    }

    /// Writes the full canonical encoding.
    pub fn write_full(&self, ser: &mut Serializer) -> StreamResult<()> {
        let count = u16::try_from(self.attributes.len()).map_err(|_| {
            StreamError::LengthOverflow {
                length: self.attributes.len(),
                max: u16::MAX as usize,
            }
        })?;
        ser.write_u16(count)?;
        for attr in &self.attributes {
            attr.write(ser)?;
        }
        Ok(())
    }

    /// Reads a full encoding into the component's slots.
    ///
    /// The slot count and every slot type must match this component's layout;
    /// anything else is [`StreamError::InvalidEncoding`].
    pub fn read_full(&mut self, de: &mut Deserializer<'_>) -> StreamResult<()> {
        let count_pos = de.position();
        let count = de.read_u16()? as usize;
        if count != self.attributes.len() {
            return Err(StreamError::InvalidEncoding {
                position: count_pos,
            });
        }
        for slot in 0..count {
            let value_pos = de.position();
            let value = AttributeValue::read(de)?;
            if value.tag() != self.attributes[slot].tag() {
                return Err(StreamError::InvalidEncoding {
                    position: value_pos,
                });
            }
            self.attributes[slot] = value;
        }
        Ok(())
    }

    /// Delta-writes the component against its previous full encoding.
    ///
    /// `prev` is a cursor over the bytes this peer last committed for the
    /// component. Returns `false`, writing nothing, when no attribute
    /// differs; otherwise writes the changed `(slot, value)` pairs and
    /// returns `true`.
    pub fn write_delta(
        &self,
        ser: &mut Serializer,
        prev: &mut Deserializer<'_>,
    ) -> StreamResult<bool> {
        let prev_count = prev.read_u16()? as usize;
        let mut changed: Vec<u16> = Vec::new();
        for slot in 0..self.attributes.len() {
            if slot < prev_count {
                let old = AttributeValue::read(prev)?;
                if !self.attributes[slot].same_value(&old) {
                    changed.push(slot as u16);
                }
            } else {
                changed.push(slot as u16);
            }
        }
        if changed.is_empty() {
            return Ok(false);
        }
        ser.write_u16(changed.len() as u16)?;
        for slot in changed {
            ser.write_u16(slot)?;
            self.attributes[slot as usize].write(ser)?;
        }
        Ok(true)
    }

    /// Applies a delta encoding, returning whether any attribute changed.
    ///
    /// The delta body is self-describing `(slot, value)` pairs; the previous
    /// bytes are not needed because the live slots already hold the baseline
    /// state.
    pub fn read_delta(&mut self, de: &mut Deserializer<'_>) -> StreamResult<bool> {
        let count = de.read_u16()? as usize;
        let mut changed = false;
        for _ in 0..count {
            let slot_pos = de.position();
            let slot = de.read_u16()? as usize;
            if slot >= self.attributes.len() {
                return Err(StreamError::InvalidEncoding { position: slot_pos });
            }
            let value_pos = de.position();
            let value = AttributeValue::read(de)?;
            if value.tag() != self.attributes[slot].tag() {
                return Err(StreamError::InvalidEncoding {
                    position: value_pos,
                });
            }
            if !self.attributes[slot].same_value(&value) {
                changed = true;
            }
            self.attributes[slot] = value;
        }
        Ok(changed)
    }

    /// Serializes the full canonical encoding into a fresh buffer.
    pub fn full_bytes(&self, capacity: usize) -> StreamResult<Vec<u8>> {
        let mut ser = Serializer::new(capacity);
        self.write_full(&mut ser)?;
        Ok(ser.finish())
    }
}
