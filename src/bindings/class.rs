//! Class template registry
//!
//! The script-facing entity class is described by an explicit table
//! rather than runtime reflection: each dynamic property names a
//! metadata tier and which of get/set/delete are wired. Adapters export
//! the table to the script runtime and consult it before any store
//! access, so disabling a property is pure configuration.

use crate::config::BindingConfig;
use crate::entity::MetaTier;
use serde::{Deserialize, Serialize};

/// One intercepted property namespace on the entity class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicProperty {
    /// Property name at the script surface, e.g. `streamSyncedMeta`
    pub name: String,
    pub tier: MetaTier,
    pub getter: bool,
    pub setter: bool,
    pub deleter: bool,
}

/// Process-wide class template, constructed once by the host
///
/// Built deliberately (no static init): the host constructs it from
/// config during adapter setup and tears it down with the adapter.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    properties: Vec<DynamicProperty>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the stock virtual-entity template.
    ///
    /// The stream-synced property ships enabled, the synced one is gated
    /// off by default; both bulk entry points are always present at the
    /// adapter level and are not part of this table.
    pub fn from_config(config: &BindingConfig) -> Self {
        let mut registry = Self::new();
        if config.expose_synced_meta_property {
            registry.register(DynamicProperty {
                name: "syncedMeta".to_string(),
                tier: MetaTier::Synced,
                getter: config.expose_property_getters,
                setter: true,
                deleter: true,
            });
        }
        if config.expose_stream_synced_meta_property {
            registry.register(DynamicProperty {
                name: "streamSyncedMeta".to_string(),
                tier: MetaTier::StreamSynced,
                getter: config.expose_property_getters,
                setter: true,
                deleter: true,
            });
        }
        registry
    }

    /// Add or replace a property by name
    pub fn register(&mut self, property: DynamicProperty) {
        if let Some(existing) = self
            .properties
            .iter_mut()
            .find(|p| p.name == property.name)
        {
            *existing = property;
        } else {
            self.properties.push(property);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&DynamicProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn properties(&self) -> &[DynamicProperty] {
        &self.properties
    }

    /// JSON form consumed by script bootstraps
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.properties)
    }

    /// Drop the template. Wrappers already handed to scripts keep their
    /// captured table entries; new lookups see nothing.
    pub fn teardown(&mut self) {
        self.properties.clear();
    }
}
