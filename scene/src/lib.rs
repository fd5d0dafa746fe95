//! Entity-component scene graph with origin-tagged change notifications.
//!
//! The scene is the replicated data model: entities identified by
//! [`EntityId`] own ordered collections of [`Component`]s, each a list of
//! typed attribute slots. Every mutation entry point takes a
//! [`ChangeOrigin`] and emits a [`SceneEvent`] to subscribers; the origin
//! tag is what lets a replication layer tell apart local edits (replicate)
//! from applied network state (do not echo).
//!
//! Component serialization is canonical: full encodings are the slot count
//! followed by tagged values in slot order, and delta encodings are
//! `(slot, value)` pairs against a previous full encoding. Two hosts holding
//! equal state always produce identical bytes.

mod attribute;
mod component;
mod entity;
mod error;
mod registry;
mod scene;
mod types;

pub use attribute::AttributeValue;
pub use component::Component;
pub use entity::Entity;
pub use error::{SceneError, SceneResult};
pub use registry::{ComponentRegistry, ComponentSpec};
pub use scene::{Scene, SceneEvent, SceneEventKind};
pub use types::{ChangeOrigin, ComponentKey, EntityId, LOCAL_ENTITY_BIT, MAX_REPLICABLE_ID};
