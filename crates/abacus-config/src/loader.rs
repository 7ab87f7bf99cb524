//! Layered configuration loading.
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`abacus.toml` in the working directory unless a path is given)
//! 3. environment variables, e.g. `ABACUS__CACHE__TTL=60s`

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};

use crate::engine::EngineConfig;
use crate::{ConfigError, Result};

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "abacus.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ABACUS";

/// Load and validate the engine configuration.
///
/// A missing file is not an error; defaults and environment overrides still apply.
///
/// # Errors
///
/// Returns an error if a source cannot be parsed or the merged result fails validation.
pub fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    let mut builder = Config::builder();

    let file = path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if file.exists() {
        tracing::debug!(path = %file.display(), "Loading configuration file");
        builder = builder.add_source(File::from(file));
    } else if path.is_some() {
        tracing::warn!(path = %file.display(), "Configuration file not found, using defaults");
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__"),
    );

    let cfg = builder
        .build()
        .map_err(|e| ConfigError::load(format!("config build error: {e}")))?;
    let merged: EngineConfig = cfg
        .try_deserialize()
        .map_err(|e| ConfigError::parse(format!("config deserialize error: {e}")))?;

    merged.validate()?;
    Ok(merged)
}

/// Load configuration from an optional path-like value.
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with_default_path<P: AsRef<Path>>(path: Option<P>) -> Result<EngineConfig> {
    let p = path
        .as_ref()
        .map(|p| p.as_ref().to_string_lossy().to_string());
    load_config(p.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[cache]
ttl = "90s"
max_entries = 50

[hierarchy]
max_depth = 4
"#
        )
        .unwrap();

        let config = load_config_with_default_path(Some(file.path())).unwrap();
        assert_eq!(config.cache.ttl, Duration::from_secs(90));
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.hierarchy.max_depth, 4);
        assert!(config.ability.role_defaults_enabled);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/definitely/not/here/abacus.toml")).unwrap();
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[hierarchy]\nmax_depth = 0").unwrap();

        let err = load_config_with_default_path(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
