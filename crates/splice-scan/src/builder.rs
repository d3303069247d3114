//! Packaging-time fingerprint builder

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::phase::Phase;
use crate::scanner::Scanner;
use crate::source::UnitSource;
use splice_fingerprint::LibraryFingerprint;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Builds the [`LibraryFingerprint`] a plugin requires from its entry classes
///
/// Roots and owned classes are the plugin's own code: they are traversed for
/// their references but left out of the result, since they are injected
/// rather than required.
///
/// # Example
///
/// ```rust
/// use splice_scan::FingerprintBuilder;
/// use std::collections::HashMap;
///
/// let source: HashMap<String, Vec<u8>> = HashMap::new();
/// let fp = FingerprintBuilder::new(&source).root("com.acme.Missing").build().unwrap();
/// assert!(fp.is_empty());
/// ```
#[derive(Debug)]
pub struct FingerprintBuilder<'s, S: UnitSource + ?Sized> {
    source: &'s S,
    config: ScanConfig,
    roots: Vec<String>,
    owned: BTreeSet<String>,
}

impl<'s, S: UnitSource + ?Sized> FingerprintBuilder<'s, S> {
    /// Create builder over `source` with default config
    #[must_use]
    pub fn new(source: &'s S) -> Self {
        Self {
            source,
            config: ScanConfig::default(),
            roots: Vec::new(),
            owned: BTreeSet::new(),
        }
    }

    /// With config
    #[must_use]
    pub fn with_config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a scan root
    #[must_use]
    pub fn root(mut self, class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        if !self.roots.contains(&class_name) {
            self.roots.push(class_name);
        }
        self
    }

    /// Add several scan roots
    #[must_use]
    pub fn roots<I, T>(self, class_names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        class_names.into_iter().fold(self, |builder, name| builder.root(name))
    }

    /// Mark classes as the plugin's own
    #[must_use]
    pub fn owned<I, T>(mut self, class_names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.owned.extend(class_names.into_iter().map(Into::into));
        self
    }

    /// Scan, deepen and collate
    ///
    /// # Errors
    /// Returns [`ScanError::Collation`] if the registry is inconsistent. Missing
    /// or unreadable classes are skipped with a warning, not reported.
    pub fn build(self) -> Result<LibraryFingerprint, ScanError> {
        let mut owned = self.owned;
        owned.extend(self.roots.iter().cloned());

        let mut scanner = Scanner::new(self.source, self.config.exclusion_filter())
            .with_owned(owned.iter().cloned());
        let scanned_roots = self
            .roots
            .iter()
            .filter(|root| scanner.fingerprint(Phase::Load, root))
            .count();
        let deepened = scanner.compass(self.config.compass_depth);
        debug!(roots = scanned_roots, deepened, logs = scanner.logs().len(), "scan finished");

        let classes: Vec<_> = scanner
            .collate(self.config.collate_phase)?
            .into_iter()
            .filter(|class| !owned.contains(class.name()))
            .collect();
        let fingerprint = LibraryFingerprint::new(classes);
        info!(
            roots = self.roots.len(),
            classes = fingerprint.len(),
            phase = %self.config.collate_phase,
            "fingerprint built"
        );
        Ok(fingerprint)
    }
}
