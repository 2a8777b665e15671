//! Scripting binding layer
//!
//! Exposes virtual-entity metadata to embedded scripting runtimes through
//! a language-agnostic protocol plus per-language adapters:
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                  Script (JS)                     │
//! │   VirtualEntity.getByID(id).streamSyncedMeta.k   │
//! └───────────────────────┬──────────────────────────┘
//!                         │ class template + proxies
//!                         v
//! ┌──────────────────────────────────────────────────┐
//! │       Binding adapter (rquickjs, per-language)   │
//! └───────────────────────┬──────────────────────────┘
//!                         │ marshal + validate
//!                         v
//! ┌──────────────────────────────────────────────────┐
//! │            Metadata sync façade                  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! The class template (`class`) is an explicit interception table: the
//! adapter consults it instead of relying on runtime reflection, so the
//! exposed surface is a config decision, not a code change.

pub mod class;
pub mod js;
pub mod protocol;

pub use class::{ClassRegistry, DynamicProperty};
pub use js::JsBindingAdapter;
pub use protocol::{BindingAdapter, BindingEvent};
