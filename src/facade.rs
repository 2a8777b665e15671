//! Metadata sync façade
//!
//! Uniform bulk and per-key access to both metadata tiers. The façade
//! validates before it touches entity state: caller identity first, then
//! argument shape, then the store write. Failures are silent no-ops or
//! boolean results, never errors propagated to the caller.
//!
//! Every successful mutation is emitted on a change feed that the sync
//! layer drains to build replication packets.

use crate::core::utils::current_timestamp_ms;
use crate::entity::{EntityId, EntityRegistry, MetaTier};
use crate::value::MetaValue;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One observed store mutation, emitted after the write succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaChange {
    pub entity: EntityId,
    pub tier: MetaTier,
    pub key: String,
    /// `None` means the key was deleted
    pub value: Option<MetaValue>,
    pub timestamp_ms: u64,
}

/// Shared-registry façade handed to binding adapters
#[derive(Clone)]
pub struct MetaFacade {
    registry: Arc<Mutex<EntityRegistry>>,
    change_tx: Sender<MetaChange>,
}

impl MetaFacade {
    /// Wrap a registry. The returned receiver is the replication change
    /// feed; dropping it is fine, mutations keep working.
    pub fn new(registry: Arc<Mutex<EntityRegistry>>) -> (Self, Receiver<MetaChange>) {
        let (change_tx, change_rx) = unbounded();
        (
            Self {
                registry,
                change_tx,
            },
            change_rx,
        )
    }

    /// Handle to the underlying registry, for engine-side plumbing
    pub fn registry_handle(&self) -> Arc<Mutex<EntityRegistry>> {
        Arc::clone(&self.registry)
    }

    /// Store `value` under `key` in the tier's store, overwriting any
    /// existing entry. An unresolvable caller is a silent no-op.
    pub fn set(&self, entity: EntityId, tier: MetaTier, key: &str, value: MetaValue) {
        let mut registry = self.registry.lock().unwrap();
        let Some(target) = registry.get_mut(entity) else {
            tracing::debug!(target: "facade", "set on unresolvable entity {}", entity);
            return;
        };
        target.set_meta(tier, key, value.clone());
        drop(registry);
        self.emit(entity, tier, key, Some(value));
    }

    /// Remove `key` from the tier's store.
    ///
    /// `Some(true)` if an entry existed and was removed, `Some(false)` if
    /// not (a no-op, not an error), `None` when the caller does not
    /// resolve to a live entity.
    pub fn delete(&self, entity: EntityId, tier: MetaTier, key: &str) -> Option<bool> {
        let mut registry = self.registry.lock().unwrap();
        let target = registry.get_mut(entity)?;
        let existed = target.delete_meta(tier, key);
        drop(registry);
        if existed {
            self.emit(entity, tier, key, None);
        }
        Some(existed)
    }

    /// Bulk set. Entries whose value is `None` (a failed conversion
    /// upstream) are skipped; the rest are applied. Best-effort, not
    /// atomic.
    pub fn set_multiple<I>(&self, entity: EntityId, tier: MetaTier, entries: I)
    where
        I: IntoIterator<Item = (String, Option<MetaValue>)>,
    {
        let mut registry = self.registry.lock().unwrap();
        let Some(target) = registry.get_mut(entity) else {
            tracing::debug!(target: "facade", "bulk set on unresolvable entity {}", entity);
            return;
        };
        let mut applied = Vec::new();
        for (key, value) in entries {
            match value {
                Some(value) => {
                    target.set_meta(tier, key.clone(), value.clone());
                    applied.push((key, value));
                }
                None => {
                    tracing::debug!(
                        target: "facade",
                        "skipping unconvertible value for key '{}' on entity {}",
                        key,
                        entity
                    );
                }
            }
        }
        drop(registry);
        for (key, value) in applied {
            self.emit(entity, tier, &key, Some(value));
        }
    }

    /// Read a single key. `None` both when unset and when the caller is
    /// unresolvable; the script surface sees the same absent sentinel
    /// either way.
    pub fn get(&self, entity: EntityId, tier: MetaTier, key: &str) -> Option<MetaValue> {
        let registry = self.registry.lock().unwrap();
        registry.get(entity)?.get_meta(tier, key).cloned()
    }

    pub fn has(&self, entity: EntityId, tier: MetaTier, key: &str) -> bool {
        let registry = self.registry.lock().unwrap();
        registry
            .get(entity)
            .map(|e| e.has_meta(tier, key))
            .unwrap_or(false)
    }

    /// Whether the id resolves to a live entity
    pub fn is_valid(&self, entity: EntityId) -> bool {
        self.registry.lock().unwrap().contains(entity)
    }

    fn emit(&self, entity: EntityId, tier: MetaTier, key: &str, value: Option<MetaValue>) {
        let _ = self.change_tx.send(MetaChange {
            entity,
            tier,
            key: key.to_string(),
            value,
            timestamp_ms: current_timestamp_ms(),
        });
    }
}
