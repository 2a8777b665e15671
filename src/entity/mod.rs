//! Virtual entities and their metadata stores
//!
//! A virtual entity is a server-side object with no physical presence of
//! its own: a position, a streaming range, and two independent key-value
//! metadata stores. The synced store replicates to every observer, the
//! stream-synced store only to observers that currently have the entity
//! streamed in.

use crate::value::MetaValue;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Network-wide entity identifier
pub type EntityId = u64;

/// The two independent metadata namespaces on an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetaTier {
    /// Replicated to all observers unconditionally
    Synced,
    /// Replicated only to observers with the entity streamed in
    StreamSynced,
}

impl MetaTier {
    /// Name used at the script surface and in config/logs
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaTier::Synced => "synced",
            MetaTier::StreamSynced => "streamSynced",
        }
    }

    /// Inverse of [`MetaTier::as_str`]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "synced" => Some(MetaTier::Synced),
            "streamSynced" => Some(MetaTier::StreamSynced),
            _ => None,
        }
    }
}

/// String-keyed store backing one metadata tier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaStore {
    entries: HashMap<String, MetaValue>,
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.entries.get(key)
    }

    /// Insert or overwrite an entry
    pub fn set(&mut self, key: impl Into<String>, value: MetaValue) {
        self.entries.insert(key.into(), value);
    }

    /// Remove an entry. Returns whether an entry existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Bulk insert. Existing keys are overwritten, everything else is
    /// untouched.
    pub fn set_multiple(&mut self, values: HashMap<String, MetaValue>) {
        self.entries.extend(values);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Clone out the full contents, used for stream-in snapshots
    pub fn snapshot(&self) -> Vec<(String, MetaValue)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A scriptable virtual entity
#[derive(Debug, Clone)]
pub struct VirtualEntity {
    /// Network-wide id
    pub id: EntityId,
    /// World position, drives stream scoping
    pub position: Vec3,
    /// Observers within this range have the entity streamed in
    pub stream_range: f32,
    synced: MetaStore,
    stream_synced: MetaStore,
}

impl VirtualEntity {
    pub fn new(id: EntityId, position: Vec3, stream_range: f32) -> Self {
        Self {
            id,
            position,
            stream_range,
            synced: MetaStore::new(),
            stream_synced: MetaStore::new(),
        }
    }

    pub fn store(&self, tier: MetaTier) -> &MetaStore {
        match tier {
            MetaTier::Synced => &self.synced,
            MetaTier::StreamSynced => &self.stream_synced,
        }
    }

    pub fn store_mut(&mut self, tier: MetaTier) -> &mut MetaStore {
        match tier {
            MetaTier::Synced => &mut self.synced,
            MetaTier::StreamSynced => &mut self.stream_synced,
        }
    }

    pub fn has_meta(&self, tier: MetaTier, key: &str) -> bool {
        self.store(tier).has(key)
    }

    pub fn get_meta(&self, tier: MetaTier, key: &str) -> Option<&MetaValue> {
        self.store(tier).get(key)
    }

    pub fn set_meta(&mut self, tier: MetaTier, key: impl Into<String>, value: MetaValue) {
        self.store_mut(tier).set(key, value);
    }

    /// Returns whether an entry existed for `key`
    pub fn delete_meta(&mut self, tier: MetaTier, key: &str) -> bool {
        self.store_mut(tier).delete(key)
    }

    pub fn set_multiple_meta(&mut self, tier: MetaTier, values: HashMap<String, MetaValue>) {
        self.store_mut(tier).set_multiple(values);
    }
}

/// Owns every live virtual entity, keyed by id
///
/// Entity lifetime is engine business: the registry spawns and destroys,
/// the metadata layer only resolves ids against it.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<EntityId, VirtualEntity>,
    next_id: EntityId,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity and return its id
    pub fn spawn(&mut self, position: Vec3, stream_range: f32) -> EntityId {
        self.next_id += 1;
        let id = self.next_id;
        self.entities
            .insert(id, VirtualEntity::new(id, position, stream_range));
        tracing::debug!(target: "entity", "spawned virtual entity {}", id);
        id
    }

    /// Destroy an entity and its stores. Returns whether it existed.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        let existed = self.entities.remove(&id).is_some();
        if existed {
            tracing::debug!(target: "entity", "destroyed virtual entity {}", id);
        }
        existed
    }

    pub fn get(&self, id: EntityId) -> Option<&VirtualEntity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut VirtualEntity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VirtualEntity> {
        self.entities.values()
    }
}
