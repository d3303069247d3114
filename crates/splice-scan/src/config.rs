//! Scanner configuration

use crate::exclusion::Exclusions;
use crate::phase::Phase;
use serde::{Deserialize, Serialize};

/// Settings for one fingerprint build or compatibility check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Maximum classes `compass` deepens after the roots
    pub compass_depth: usize,

    /// Weakest phase kept by collation
    pub collate_phase: Phase,

    /// Prefixes excluded on top of the platform defaults
    pub exclusions: Vec<String>,
}

impl ScanConfig {
    /// Create config with defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With compass depth
    #[inline]
    #[must_use]
    pub fn with_compass_depth(mut self, depth: usize) -> Self {
        self.compass_depth = depth;
        self
    }

    /// With collation cutoff
    #[inline]
    #[must_use]
    pub fn with_collate_phase(mut self, phase: Phase) -> Self {
        self.collate_phase = phase;
        self
    }

    /// With an extra excluded prefix
    #[must_use]
    pub fn with_exclusion(mut self, prefix: impl Into<String>) -> Self {
        self.exclusions.push(prefix.into());
        self
    }

    /// Effective exclusion filter
    #[must_use]
    pub fn exclusion_filter(&self) -> Exclusions {
        self.exclusions
            .iter()
            .fold(Exclusions::new(), |ex, prefix| ex.with_prefix(prefix.clone()))
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            compass_depth: 64,
            collate_phase: Phase::Call,
            exclusions: Vec::new(),
        }
    }
}
