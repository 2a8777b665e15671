//! # Virtual Entity
//!
//! Script-facing metadata synchronization layer for multiplayer virtual
//! entities.
//!
//! ## Features
//!
//! - **Two-tier metadata**: independent `synced` and `streamSynced`
//!   key-value stores per entity
//! - **Sync façade**: validated set/get/delete and best-effort bulk set,
//!   with silent-no-op failure semantics safe to expose to scripts
//! - **Stream scoping**: distance-gated replication with stream-in
//!   snapshots and per-observer packet batching
//! - **Scripting surface**: QuickJS bindings built from an explicit,
//!   config-driven class template (Proxy-backed dynamic properties)
//!
//! ## Example
//!
//! ```ignore
//! use virtual_entity::bindings::{BindingAdapter, JsBindingAdapter};
//! use virtual_entity::config::SyncConfig;
//! use virtual_entity::entity::EntityRegistry;
//! use virtual_entity::facade::MetaFacade;
//! use std::sync::{Arc, Mutex};
//!
//! let config = SyncConfig::default();
//! let registry = Arc::new(Mutex::new(EntityRegistry::new()));
//! let (facade, changes) = MetaFacade::new(Arc::clone(&registry));
//! let mut adapter = JsBindingAdapter::new(facade, &config.binding)?;
//! adapter.init()?;
//! adapter.execute_script("VirtualEntity.getByID(1)?.streamSyncedMeta.hp = 50;")?;
//! ```
//!
//! ## Modules
//!
//! - [`core`]: errors, logging setup, shared helpers
//! - [`value`]: the tagged metadata value model
//! - [`entity`]: entities, per-tier stores, the registry
//! - [`facade`]: the metadata sync façade
//! - [`sync`]: stream scoping and replication packets
//! - [`bindings`]: scripting adapters and the class template
//! - [`config`]: TOML-backed configuration

/// Errors, logging setup and shared helpers
pub mod core;
/// Tagged metadata value model
pub mod value;
/// Virtual entities and their metadata stores
pub mod entity;
/// Metadata sync façade
pub mod facade;
/// Stream scoping and replication
pub mod sync;
/// Scripting binding layer
pub mod bindings;
/// Configuration system
pub mod config;

pub use crate::core::error::EntityMetaError;
pub use crate::entity::{EntityId, EntityRegistry, MetaTier, VirtualEntity};
pub use crate::facade::{MetaChange, MetaFacade};
pub use crate::value::MetaValue;
