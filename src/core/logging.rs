//! Tracing setup
//!
//! All modules log through `tracing` with stable targets (`facade`,
//! `entity`, `sync`, `bindings`, `script`). Hosts embedding the crate can
//! install their own subscriber instead of calling [`init`].

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatted subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
