//! Metadata replication
//!
//! Consumes the façade's change feed and turns it into per-observer sync
//! packets:
//!
//! ```text
//! ┌──────────┐  MetaChange   ┌────────────────┐  packets   ┌───────────┐
//! │  Façade  │──────────────►│ SyncDispatcher │───────────►│ Observers │
//! └──────────┘               │  + StreamScope │            └───────────┘
//!                            └────────────────┘
//! ```
//!
//! Synced-tier changes go to every observer. Stream-synced changes go only
//! to observers that currently have the entity streamed in, and an
//! observer entering an entity's stream range first receives a full
//! snapshot of its stream-synced store. Transport is out of scope; packets
//! are handed back bincode-encodable.

use crate::core::error::{SyncError, SyncResult};
use crate::core::utils::current_timestamp_ms;
use crate::entity::{EntityId, EntityRegistry, MetaTier};
use crate::facade::MetaChange;
use crate::value::MetaValue;
use crossbeam_channel::Receiver;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Network-wide observer (player/client) identifier
pub type ObserverId = u64;

/// One key mutation inside a sync packet. `value: None` is a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaSyncEntry {
    pub key: String,
    pub value: Option<MetaValue>,
}

/// A batch of metadata mutations for one entity and tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaSyncPacket {
    /// Monotonic per-dispatcher sequence
    pub sequence: u64,
    pub entity: EntityId,
    pub tier: MetaTier,
    pub entries: Vec<MetaSyncEntry>,
    pub timestamp_ms: u64,
}

impl MetaSyncPacket {
    pub fn encode(&self) -> SyncResult<Vec<u8>> {
        bincode::serialize(self).map_err(SyncError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        bincode::deserialize(bytes).map_err(SyncError::Decode)
    }
}

/// A stream-in or stream-out transition produced by a scope refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTransition {
    pub entity: EntityId,
    pub observer: ObserverId,
    pub entered: bool,
}

/// Tracks which observers have which entities streamed in
///
/// Scoping is distance-based: an observer within an entity's
/// `stream_range` of its position has it streamed in.
#[derive(Debug, Default)]
pub struct StreamScope {
    observer_positions: HashMap<ObserverId, Vec3>,
    streamed: HashMap<EntityId, HashSet<ObserverId>>,
}

impl StreamScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer or move an existing one
    pub fn update_observer(&mut self, observer: ObserverId, position: Vec3) {
        self.observer_positions.insert(observer, position);
    }

    pub fn remove_observer(&mut self, observer: ObserverId) {
        self.observer_positions.remove(&observer);
        for set in self.streamed.values_mut() {
            set.remove(&observer);
        }
    }

    pub fn observers(&self) -> impl Iterator<Item = ObserverId> + '_ {
        self.observer_positions.keys().copied()
    }

    pub fn is_streamed_in(&self, entity: EntityId, observer: ObserverId) -> bool {
        self.streamed
            .get(&entity)
            .map(|set| set.contains(&observer))
            .unwrap_or(false)
    }

    pub fn streamed_observers(&self, entity: EntityId) -> impl Iterator<Item = ObserverId> + '_ {
        self.streamed
            .get(&entity)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Recompute scoping against current entity and observer positions,
    /// returning the transitions since the last refresh.
    pub fn refresh(&mut self, registry: &EntityRegistry) -> Vec<StreamTransition> {
        let mut transitions = Vec::new();
        let mut seen = HashSet::new();

        for entity in registry.iter() {
            seen.insert(entity.id);
            let in_range: HashSet<ObserverId> = self
                .observer_positions
                .iter()
                .filter(|(_, pos)| entity.position.distance(**pos) <= entity.stream_range)
                .map(|(id, _)| *id)
                .collect();

            let previous = self.streamed.entry(entity.id).or_default();
            for observer in in_range.difference(previous) {
                transitions.push(StreamTransition {
                    entity: entity.id,
                    observer: *observer,
                    entered: true,
                });
            }
            for observer in previous.difference(&in_range) {
                transitions.push(StreamTransition {
                    entity: entity.id,
                    observer: *observer,
                    entered: false,
                });
            }
            *previous = in_range;
        }

        // Destroyed entities drop out of the scope table entirely.
        self.streamed.retain(|id, _| seen.contains(id));
        transitions
    }
}

/// Drains the change feed into per-observer packets
pub struct SyncDispatcher {
    change_rx: Receiver<MetaChange>,
    registry: Arc<Mutex<EntityRegistry>>,
    scope: StreamScope,
    sequence: u64,
    max_entries_per_packet: usize,
}

impl SyncDispatcher {
    pub fn new(
        change_rx: Receiver<MetaChange>,
        registry: Arc<Mutex<EntityRegistry>>,
        max_entries_per_packet: usize,
    ) -> Self {
        Self {
            change_rx,
            registry,
            scope: StreamScope::new(),
            sequence: 0,
            max_entries_per_packet: max_entries_per_packet.max(1),
        }
    }

    pub fn scope(&self) -> &StreamScope {
        &self.scope
    }

    pub fn update_observer(&mut self, observer: ObserverId, position: Vec3) {
        self.scope.update_observer(observer, position);
    }

    pub fn remove_observer(&mut self, observer: ObserverId) {
        self.scope.remove_observer(observer);
    }

    /// One replication turn: refresh stream scope, emit snapshots for
    /// stream-ins, then batch pending changes per observer.
    pub fn tick(&mut self) -> Vec<(ObserverId, MetaSyncPacket)> {
        let mut out = Vec::new();
        // Observers that got a snapshot this tick already hold current
        // state; they are skipped when the change batch fans out.
        let mut snapshotted: HashSet<(EntityId, ObserverId)> = HashSet::new();

        let transitions = {
            let registry = self.registry.lock().unwrap();
            let transitions = self.scope.refresh(&registry);

            // Stream-in snapshots carry the full stream-synced store so a
            // newly scoped-in observer starts from current state.
            for transition in transitions.iter().filter(|t| t.entered) {
                let Some(entity) = registry.get(transition.entity) else {
                    continue;
                };
                let store = entity.store(MetaTier::StreamSynced);
                if store.is_empty() {
                    continue;
                }
                let entries = store
                    .snapshot()
                    .into_iter()
                    .map(|(key, value)| MetaSyncEntry {
                        key,
                        value: Some(value),
                    })
                    .collect();
                self.sequence += 1;
                snapshotted.insert((transition.entity, transition.observer));
                out.push((
                    transition.observer,
                    MetaSyncPacket {
                        sequence: self.sequence,
                        entity: transition.entity,
                        tier: MetaTier::StreamSynced,
                        entries,
                        timestamp_ms: current_timestamp_ms(),
                    },
                ));
            }
            transitions
        };
        if !transitions.is_empty() {
            tracing::debug!(target: "sync", "{} stream transitions", transitions.len());
        }

        // Batch pending changes by (entity, tier), preserving arrival
        // order within each batch.
        let mut batches: Vec<((EntityId, MetaTier), Vec<MetaSyncEntry>)> = Vec::new();
        for change in self.change_rx.try_iter() {
            let bucket = (change.entity, change.tier);
            let entry = MetaSyncEntry {
                key: change.key,
                value: change.value,
            };
            match batches.iter_mut().find(|(key, _)| *key == bucket) {
                Some((_, entries)) => entries.push(entry),
                None => batches.push((bucket, vec![entry])),
            }
        }

        for ((entity, tier), entries) in batches {
            let recipients: Vec<ObserverId> = match tier {
                MetaTier::Synced => self.scope.observers().collect(),
                MetaTier::StreamSynced => self
                    .scope
                    .streamed_observers(entity)
                    .filter(|observer| !snapshotted.contains(&(entity, *observer)))
                    .collect(),
            };
            if recipients.is_empty() {
                continue;
            }
            for chunk in entries.chunks(self.max_entries_per_packet) {
                self.sequence += 1;
                let packet = MetaSyncPacket {
                    sequence: self.sequence,
                    entity,
                    tier,
                    entries: chunk.to_vec(),
                    timestamp_ms: current_timestamp_ms(),
                };
                for observer in &recipients {
                    out.push((*observer, packet.clone()));
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::MetaFacade;

    fn setup(range: f32) -> (MetaFacade, SyncDispatcher, EntityId) {
        let registry = Arc::new(Mutex::new(EntityRegistry::new()));
        let id = registry.lock().unwrap().spawn(Vec3::ZERO, range);
        let (facade, rx) = MetaFacade::new(Arc::clone(&registry));
        let dispatcher = SyncDispatcher::new(rx, registry, 64);
        (facade, dispatcher, id)
    }

    #[test]
    fn test_synced_changes_reach_all_observers() {
        let (facade, mut dispatcher, id) = setup(100.0);
        dispatcher.update_observer(1, Vec3::new(10.0, 0.0, 0.0));
        dispatcher.update_observer(2, Vec3::new(5000.0, 0.0, 0.0));
        dispatcher.tick();

        facade.set(id, MetaTier::Synced, "owner", MetaValue::from("alice"));
        let packets = dispatcher.tick();

        let recipients: HashSet<ObserverId> = packets.iter().map(|(o, _)| *o).collect();
        assert_eq!(recipients, HashSet::from([1, 2]));
        assert!(packets.iter().all(|(_, p)| p.tier == MetaTier::Synced));
    }

    #[test]
    fn test_stream_synced_changes_are_scoped() {
        let (facade, mut dispatcher, id) = setup(100.0);
        dispatcher.update_observer(1, Vec3::new(10.0, 0.0, 0.0));
        dispatcher.update_observer(2, Vec3::new(5000.0, 0.0, 0.0));
        dispatcher.tick();

        facade.set(id, MetaTier::StreamSynced, "hp", MetaValue::Number(50.0));
        let packets = dispatcher.tick();

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].0, 1);
        assert_eq!(packets[0].1.entries[0].key, "hp");
    }

    #[test]
    fn test_stream_in_snapshot() {
        let (facade, mut dispatcher, id) = setup(100.0);
        facade.set(id, MetaTier::StreamSynced, "hp", MetaValue::Number(75.0));
        facade.set(id, MetaTier::StreamSynced, "name", MetaValue::from("npc"));
        // Observer starts out of range; the set changes above go nowhere.
        dispatcher.update_observer(1, Vec3::new(5000.0, 0.0, 0.0));
        assert!(dispatcher.tick().is_empty());

        // Moving into range triggers a full snapshot.
        dispatcher.update_observer(1, Vec3::new(10.0, 0.0, 0.0));
        let packets = dispatcher.tick();
        assert_eq!(packets.len(), 1);
        let (observer, packet) = &packets[0];
        assert_eq!(*observer, 1);
        assert_eq!(packet.tier, MetaTier::StreamSynced);
        assert_eq!(packet.entries.len(), 2);
        assert!(packet.entries.iter().all(|e| e.value.is_some()));
    }

    #[test]
    fn test_snapshot_supersedes_same_tick_changes() {
        let (facade, mut dispatcher, id) = setup(100.0);
        dispatcher.update_observer(1, Vec3::new(5000.0, 0.0, 0.0));
        dispatcher.update_observer(2, Vec3::new(10.0, 0.0, 0.0));
        dispatcher.tick();

        // Change lands while observer 1 is still out of range; it enters
        // before the next tick, so the snapshot already carries it.
        facade.set(id, MetaTier::StreamSynced, "hp", MetaValue::Number(5.0));
        dispatcher.update_observer(1, Vec3::new(10.0, 0.0, 0.0));
        let packets = dispatcher.tick();

        let to_entering: Vec<_> = packets.iter().filter(|(o, _)| *o == 1).collect();
        assert_eq!(to_entering.len(), 1);
        assert_eq!(to_entering[0].1.entries[0].key, "hp");

        // Already-streamed observer still gets the change batch.
        let to_resident: Vec<_> = packets.iter().filter(|(o, _)| *o == 2).collect();
        assert_eq!(to_resident.len(), 1);
    }

    #[test]
    fn test_stream_out_stops_delivery() {
        let (facade, mut dispatcher, id) = setup(100.0);
        dispatcher.update_observer(1, Vec3::new(10.0, 0.0, 0.0));
        dispatcher.tick();

        dispatcher.update_observer(1, Vec3::new(5000.0, 0.0, 0.0));
        dispatcher.tick();

        facade.set(id, MetaTier::StreamSynced, "hp", MetaValue::Number(1.0));
        assert!(dispatcher.tick().is_empty());
    }

    #[test]
    fn test_batch_chunking() {
        let registry = Arc::new(Mutex::new(EntityRegistry::new()));
        let id = registry.lock().unwrap().spawn(Vec3::ZERO, 100.0);
        let (facade, rx) = MetaFacade::new(Arc::clone(&registry));
        let mut dispatcher = SyncDispatcher::new(rx, registry, 2);
        dispatcher.update_observer(1, Vec3::ZERO);
        dispatcher.tick();

        for i in 0..5 {
            facade.set(
                id,
                MetaTier::Synced,
                &format!("k{}", i),
                MetaValue::Number(i as f64),
            );
        }
        let packets = dispatcher.tick();
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|(_, p)| p.entries.len() <= 2));
        // Sequences are strictly increasing.
        let mut last = 0;
        for (_, packet) in &packets {
            assert!(packet.sequence > last);
            last = packet.sequence;
        }
    }

    #[test]
    fn test_packet_encode_decode() {
        let packet = MetaSyncPacket {
            sequence: 7,
            entity: 3,
            tier: MetaTier::StreamSynced,
            entries: vec![MetaSyncEntry {
                key: "hp".into(),
                value: Some(MetaValue::Number(12.0)),
            }],
            timestamp_ms: 1234,
        };
        let bytes = packet.encode().unwrap();
        assert_eq!(MetaSyncPacket::decode(&bytes).unwrap(), packet);
        assert!(MetaSyncPacket::decode(&[0xff, 0x01]).is_err());
    }

    #[test]
    fn test_delete_replicates_as_tombstone() {
        let (facade, mut dispatcher, id) = setup(100.0);
        dispatcher.update_observer(1, Vec3::ZERO);
        dispatcher.tick();

        facade.set(id, MetaTier::Synced, "flag", MetaValue::Bool(true));
        dispatcher.tick();
        facade.delete(id, MetaTier::Synced, "flag");
        let packets = dispatcher.tick();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].1.entries[0].value, None);
    }
}
