//! Core support module
//!
//! - `error` - crate-wide error types
//! - `logging` - tracing subscriber setup
//! - `utils` - small shared helpers

pub mod error;
pub mod logging;
pub mod utils;

pub use error::{BindingError, BindingResult, EntityMetaError, SyncError, SyncResult};
