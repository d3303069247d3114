//! Tool configuration file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use splice_inject::InjectConfig;
use splice_scan::ScanConfig;
use std::path::Path;

/// Contents of `--config`; every section and key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SpliceConfig {
    /// Fingerprint build settings
    pub(crate) scan: ScanConfig,

    /// Attach-time policy
    pub(crate) inject: InjectConfig,
}

impl SpliceConfig {
    /// Load from `path`, or defaults when no file is given
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_scan::Phase;

    #[test]
    fn sections_are_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("splice.toml");
        std::fs::write(
            &path,
            "[scan]\ncompass_depth = 5\ncollate_phase = \"load\"\nexclusions = [\"org.slf4j.\"]\n",
        )
        .unwrap();

        let config = SpliceConfig::load(Some(&path)).unwrap();
        assert_eq!(config.scan.compass_depth, 5);
        assert_eq!(config.scan.collate_phase, Phase::Load);
        assert!(config.scan.exclusion_filter().is_excluded("org.slf4j.Logger"));
        assert_eq!(config.inject, InjectConfig::default());
    }

    #[test]
    fn no_file_means_defaults() {
        assert_eq!(SpliceConfig::load(None).unwrap(), SpliceConfig::default());
    }

    #[test]
    fn unreadable_file_is_reported() {
        let err = SpliceConfig::load(Some(Path::new("/nonexistent/splice.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
