//! Configuration
//!
//! TOML-backed configuration for the binding surface and the replication
//! layer. Everything has a sensible default; a host can run with
//! `SyncConfig::default()` and never touch a file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File read error
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// TOML parse error
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// Semantic validation error
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which dynamic properties the class template wires up
///
/// The bulk entry points are always exposed for both tiers. Per-key
/// property access to the synced tier ships disabled; flipping
/// `expose_synced_meta_property` turns it on without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Wire per-key get/set/delete for the synced tier
    #[serde(default)]
    pub expose_synced_meta_property: bool,
    /// Wire per-key get/set/delete for the stream-synced tier
    #[serde(default = "default_true")]
    pub expose_stream_synced_meta_property: bool,
    /// Wire property getters on exposed tiers. The stock surface is
    /// write-only per key; reads go through the engine API.
    #[serde(default)]
    pub expose_property_getters: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            expose_synced_meta_property: false,
            expose_stream_synced_meta_property: true,
            expose_property_getters: false,
        }
    }
}

/// Stream-scoping defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Stream range (world units) for entities spawned without one
    #[serde(default = "default_stream_range")]
    pub default_range: f32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            default_range: default_stream_range(),
        }
    }
}

/// Replication batching limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on entries per sync packet
    #[serde(default = "default_max_entries")]
    pub max_entries_per_packet: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_entries_per_packet: default_max_entries(),
        }
    }
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub binding: BindingConfig,

    #[serde(default)]
    pub streaming: StreamingConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SyncConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic validation beyond what serde enforces
    pub fn validate(&self) -> ConfigResult<()> {
        if self.streaming.default_range <= 0.0 {
            return Err(ConfigError::ValidationError(
                "streaming.default_range must be positive".to_string(),
            ));
        }
        if self.batch.max_entries_per_packet == 0 {
            return Err(ConfigError::ValidationError(
                "batch.max_entries_per_packet must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_stream_range() -> f32 {
    300.0
}

fn default_max_entries() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}
