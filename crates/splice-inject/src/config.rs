//! Injection policy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File read
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this structure
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Policy for the injection engine, read once at injector construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectConfig {
    /// Deny plugins that carry no fingerprint, and contexts whose check is
    /// undetermined
    pub fail_on_missing_fingerprint: bool,

    /// Contexts whose verdict each plugin remembers
    pub verdict_cache_capacity: u64,
}

impl InjectConfig {
    /// Create config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With missing-fingerprint policy
    #[inline]
    #[must_use]
    pub fn with_fail_on_missing_fingerprint(mut self, fail: bool) -> Self {
        self.fail_on_missing_fingerprint = fail;
        self
    }

    /// With verdict cache capacity
    #[inline]
    #[must_use]
    pub fn with_verdict_cache_capacity(mut self, capacity: u64) -> Self {
        self.verdict_cache_capacity = capacity;
        self
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed input.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            fail_on_missing_fingerprint: false,
            verdict_cache_capacity: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_permit_unfingerprinted_plugins() {
        let config = InjectConfig::new();
        assert!(!config.fail_on_missing_fingerprint);
        assert_eq!(config.verdict_cache_capacity, 10_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = InjectConfig::from_toml("fail_on_missing_fingerprint = true").unwrap();
        assert!(config.fail_on_missing_fingerprint);
        assert_eq!(config.verdict_cache_capacity, 10_000);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(matches!(
            InjectConfig::from_toml("fail_on_missing_fingerprint = \"maybe\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inject.toml");
        std::fs::write(&path, "verdict_cache_capacity = 5\n").unwrap();
        assert_eq!(InjectConfig::load(&path).unwrap().verdict_cache_capacity, 5);
        assert!(matches!(
            InjectConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
