//! Adapter protocol
//!
//! Language-agnostic interface between the metadata layer and script
//! runtimes. Adapters push engine-side happenings into scripts as
//! [`BindingEvent`]s; script-side mutations come back synchronously
//! through the façade, not through this protocol.

use crate::core::error::BindingResult;
use crate::entity::{EntityId, MetaTier};
use crate::facade::MetaChange;
use serde::{Deserialize, Serialize};

/// Events sent from the engine to scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BindingEvent {
    /// A synced-tier key changed (or was deleted, `value: null` with
    /// `deleted: true`)
    SyncedMetaChange {
        entity: EntityId,
        key: String,
        value: serde_json::Value,
        deleted: bool,
    },
    /// Same for the stream-synced tier
    StreamSyncedMetaChange {
        entity: EntityId,
        key: String,
        value: serde_json::Value,
        deleted: bool,
    },
    /// Entity left the world; script-side wrappers go stale
    EntityDestroyed { entity: EntityId },
}

impl BindingEvent {
    /// Build the script-facing event for a change-feed entry
    pub fn from_change(change: &MetaChange) -> Self {
        let value = change
            .value
            .as_ref()
            .map(|v| v.to_json())
            .unwrap_or(serde_json::Value::Null);
        let deleted = change.value.is_none();
        match change.tier {
            MetaTier::Synced => BindingEvent::SyncedMetaChange {
                entity: change.entity,
                key: change.key.clone(),
                value,
                deleted,
            },
            MetaTier::StreamSynced => BindingEvent::StreamSyncedMetaChange {
                entity: change.entity,
                key: change.key.clone(),
                value,
                deleted,
            },
        }
    }
}

/// Trait for language-specific binding adapters
pub trait BindingAdapter {
    /// Wire the native API and bootstrap the script-facing surface
    fn init(&mut self) -> BindingResult<()>;

    /// Dispatch an event to scripts
    fn dispatch_event(&mut self, event: &BindingEvent) -> BindingResult<()>;

    /// Tear the surface down
    fn shutdown(&mut self);
}
