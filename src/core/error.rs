//! Crate-wide error types
//!
//! Layered the same way throughout: each area defines its own error enum
//! and `EntityMetaError` can absorb any of them via `#[from]`. Script
//! callers never see these; the façade turns failures into silent no-ops
//! or boolean results before they reach the binding surface.

use crate::config::ConfigError;
use crate::value::ValueError;
use thiserror::Error;

/// Top-level error for engine-side callers
#[derive(Error, Debug)]
pub enum EntityMetaError {
    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("Binding error: {0}")]
    Binding(#[from] BindingError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while wiring or driving a scripting binding
#[derive(Error, Debug)]
pub enum BindingError {
    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("Binding adapter is not initialized")]
    NotInitialized,

    #[error("Event serialization failed: {0}")]
    EventEncode(#[from] serde_json::Error),
}

/// Errors raised by the replication layer
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Packet encoding failed: {0}")]
    Encode(#[source] bincode::Error),

    #[error("Packet decoding failed: {0}")]
    Decode(#[source] bincode::Error),
}

pub type BindingResult<T> = Result<T, BindingError>;
pub type SyncResult<T> = Result<T, SyncError>;
