//! Engine configuration types.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Root configuration of the access-control engine.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Decision cache settings.
    pub cache: CacheConfig,

    /// Organization hierarchy walk settings.
    pub hierarchy: HierarchyConfig,

    /// Ability compilation settings.
    pub ability: AbilityConfig,

    /// Field audit settings.
    pub audit: AuditConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Validate cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::validation(
                "cache.max_entries must be greater than 0 when the cache is enabled",
            ));
        }
        if self.hierarchy.max_depth == 0 {
            return Err(ConfigError::validation(
                "hierarchy.max_depth must be greater than 0",
            ));
        }
        if self.audit.channel_capacity == 0 {
            return Err(ConfigError::validation(
                "audit.channel_capacity must be greater than 0",
            ));
        }
        if self.ability.super_admin_role.trim().is_empty() {
            return Err(ConfigError::validation(
                "ability.super_admin_role must not be empty",
            ));
        }
        Ok(())
    }
}

/// Decision cache configuration.
///
/// Decisions are memoized per context fingerprint. A policy change becomes
/// visible once the entry expires or the organization is invalidated.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the decision cache.
    pub enabled: bool,

    /// Lifetime of a cached decision.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Soft upper bound on the number of cached decisions.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
            max_entries: 10_000,
        }
    }
}

/// Organization hierarchy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Walk ancestors when the originating organization yields no decision.
    pub enabled: bool,

    /// Maximum number of ancestors consulted.
    pub max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: 16,
        }
    }
}

/// Ability compiler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AbilityConfig {
    /// Role name that marks a user as super-admin.
    pub super_admin_role: String,

    /// Apply built-in role defaults when no policy applies.
    pub role_defaults_enabled: bool,

    /// Resource types managers may read, create and update by default.
    pub core_resources: Vec<String>,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self {
            super_admin_role: "super_admin".to_string(),
            role_defaults_enabled: true,
            core_resources: vec![
                "product".to_string(),
                "order".to_string(),
                "customer".to_string(),
                "category".to_string(),
                "inventory".to_string(),
            ],
        }
    }
}

/// Field audit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Publish audit events.
    pub enabled: bool,

    /// Buffer size of the audit broadcast channel.
    pub channel_capacity: usize,

    /// Fields that are sensitive for every resource type.
    pub global_sensitive_fields: Vec<String>,

    /// Additional sensitive fields per resource type.
    pub sensitive_fields: HashMap<String, Vec<String>>,

    /// Publish an event for every denied access decision.
    pub log_denied_decisions: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 1024,
            global_sensitive_fields: vec![
                "password".to_string(),
                "ssn".to_string(),
                "creditCard".to_string(),
                "bankAccount".to_string(),
                "medicalRecord".to_string(),
            ],
            sensitive_fields: HashMap::new(),
            log_denied_decisions: true,
        }
    }
}

impl AuditConfig {
    /// Returns `true` if `field` is sensitive for `resource_type`.
    pub fn is_sensitive(&self, resource_type: &str, field: &str) -> bool {
        self.global_sensitive_fields.iter().any(|f| f == field)
            || self
                .sensitive_fields
                .get(resource_type)
                .is_some_and(|fields| fields.iter().any(|f| f == field))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level filter (overridden by `RUST_LOG`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.hierarchy.max_depth, 16);
        assert_eq!(config.ability.super_admin_role, "super_admin");
        assert_eq!(config.audit.global_sensitive_fields.len(), 5);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [cache]
            ttl = "1m"

            [audit.sensitive_fields]
            product = ["costPrice"]
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.max_entries, 10_000);
        assert!(config.audit.is_sensitive("product", "costPrice"));
        assert!(config.audit.is_sensitive("order", "password"));
        assert!(!config.audit.is_sensitive("order", "costPrice"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = EngineConfig::default();
        config.cache.max_entries = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));

        let mut config = EngineConfig::default();
        config.cache.enabled = false;
        config.cache.max_entries = 0;
        assert!(config.validate().is_ok());

        let mut config = EngineConfig::default();
        config.hierarchy.max_depth = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.audit.channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.ability.super_admin_role = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
