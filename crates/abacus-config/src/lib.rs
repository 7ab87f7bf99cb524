//! Configuration for the Abacus access-control engine.
//!
//! [`EngineConfig`] groups every tunable of the engine. Each section has
//! serde defaults, so a partial TOML file (or none at all) yields a working
//! configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl = "5m"
//! max_entries = 10000
//!
//! [hierarchy]
//! max_depth = 8
//!
//! [audit.sensitive_fields]
//! product = ["costPrice", "supplierId"]
//! ```

pub mod engine;
pub mod loader;

pub use engine::{
    AbilityConfig, AuditConfig, CacheConfig, EngineConfig, HierarchyConfig, LoggingConfig,
};
pub use loader::{load_config, load_config_with_default_path};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Load error: {0}")]
    Load(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
