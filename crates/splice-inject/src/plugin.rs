//! Plugin bundles and their per-context state

use crate::context::{class_name_of, class_path, list_files, ContextId};
use dashmap::{DashMap, DashSet};
use moka::sync::Cache;
use splice_fingerprint::{CodecError, LibraryFingerprint};
use splice_scan::Verdict;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors loading or registering a plugin bundle
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// Bundle directory or fingerprint file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path read
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Fingerprint file is not a valid persisted fingerprint
    #[error("invalid fingerprint {path}: {source}")]
    Fingerprint {
        /// Fingerprint file
        path: PathBuf,
        /// Decoding failure
        #[source]
        source: CodecError,
    },

    /// A bundle with this name is already registered
    #[error("plugin bundle {0} is already registered")]
    Duplicate(String),
}

/// A plugin's own classes and resources plus the fingerprint they require
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginBundle {
    name: String,
    fingerprint: Option<LibraryFingerprint>,
    resources: BTreeMap<String, Arc<[u8]>>,
}

impl PluginBundle {
    /// Create empty bundle
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fingerprint: None,
            resources: BTreeMap::new(),
        }
    }

    /// With the fingerprint the plugin was built against
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: LibraryFingerprint) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    /// With a class
    #[must_use]
    pub fn with_class(self, class_name: &str, bytes: Vec<u8>) -> Self {
        self.with_resource(class_path(class_name), bytes)
    }

    /// With a resource at a `/`-separated path
    #[must_use]
    pub fn with_resource(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.resources.insert(path.into(), Arc::from(bytes));
        self
    }

    /// Load every file under `dir` as a resource, and the fingerprint file if given
    ///
    /// # Errors
    /// Returns [`BundleError::Io`] on read failures and
    /// [`BundleError::Fingerprint`] when the fingerprint does not decode.
    pub fn load(name: impl Into<String>, dir: &Path, fingerprint: Option<&Path>) -> Result<Self, BundleError> {
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| BundleError::Io { path, source }
        };
        let mut bundle = Self::new(name);
        for (key, path) in list_files(dir).map_err(io_error(dir))? {
            let bytes = std::fs::read(&path).map_err(io_error(&path))?;
            bundle = bundle.with_resource(key, bytes);
        }
        if let Some(path) = fingerprint {
            let bytes = std::fs::read(path).map_err(io_error(path))?;
            let fp = LibraryFingerprint::from_bytes(&bytes).map_err(|source| BundleError::Fingerprint {
                path: path.to_path_buf(),
                source,
            })?;
            bundle.fingerprint = Some(fp);
        }
        Ok(bundle)
    }

    /// Bundle name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required fingerprint, if the bundle carries one
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> Option<&LibraryFingerprint> {
        self.fingerprint.as_ref()
    }

    /// Resource bytes by path
    #[must_use]
    pub fn resource(&self, path: &str) -> Option<&Arc<[u8]>> {
        self.resources.get(path)
    }

    /// Classes in path order, as `(class name, bytes)`
    pub fn classes(&self) -> impl Iterator<Item = (String, &Arc<[u8]>)> {
        self.resources
            .iter()
            .filter_map(|(path, bytes)| class_name_of(path).map(|name| (name, bytes)))
    }

    /// Number of resources, classes included
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// True when the bundle has no resources
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Where a plugin's link to one target context stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// The context fails the plugin's fingerprint or policy
    Incompatible,
    /// Compatible, but confirmed while a class was being defined or while
    /// another thread was injecting
    Deferred,
    /// The plugin's classes are reachable from the context
    Injected,
}

impl Display for LinkState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkState::Incompatible => "incompatible",
            LinkState::Deferred => "deferred",
            LinkState::Injected => "injected",
        })
    }
}

/// Result of claiming the injection of a plugin into a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// The caller injects, then calls [`PluginContext::finish_injection`]
    Granted,
    /// Another caller is injecting
    Busy,
    /// Already injected
    Done,
}

/// Link state of one context plus whether an injection is running
#[derive(Debug, Clone, Copy, Default)]
struct Link {
    state: Option<LinkState>,
    injecting: bool,
}

/// A registered bundle with its verdict cache and link states
#[derive(Debug)]
pub struct PluginContext {
    bundle: PluginBundle,
    verdicts: Cache<ContextId, Verdict>,
    links: DashMap<ContextId, Link>,
    closed: DashSet<ContextId>,
}

impl PluginContext {
    /// Create plugin context remembering up to `capacity` verdicts
    #[must_use]
    pub fn new(bundle: PluginBundle, capacity: u64) -> Self {
        Self {
            bundle,
            verdicts: Cache::new(capacity),
            links: DashMap::new(),
            closed: DashSet::new(),
        }
    }

    /// Underlying bundle
    #[inline]
    #[must_use]
    pub fn bundle(&self) -> &PluginBundle {
        &self.bundle
    }

    /// Bundle name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.bundle.name()
    }

    /// Cached verdict for a context, if checked
    #[must_use]
    pub fn verdict(&self, context: ContextId) -> Option<Verdict> {
        self.verdicts.get(&context)
    }

    /// Link state for a context, if linked
    #[must_use]
    pub fn link_state(&self, context: ContextId) -> Option<LinkState> {
        self.links.get(&context).and_then(|link| link.state)
    }

    /// True when lookups on behalf of `context` skip this plugin
    #[must_use]
    pub fn is_closed(&self, context: ContextId) -> bool {
        self.closed.contains(&context)
    }

    /// Cached verdict, computing it once per context
    ///
    /// Concurrent callers for the same context share one computation.
    pub(crate) fn verdict_with(&self, context: ContextId, check: impl FnOnce() -> Verdict) -> Verdict {
        self.verdicts.get_with(context, check)
    }

    /// Record `state` unless the pair is already injected; returns the stored state
    ///
    /// Every transition runs under the entry lock of `context`, so an
    /// injected pair never moves back to deferred or incompatible.
    pub(crate) fn settle(&self, context: ContextId, state: LinkState) -> LinkState {
        let mut link = self.links.entry(context).or_default();
        if link.state != Some(LinkState::Injected) {
            link.state = Some(state);
        }
        link.state.unwrap_or(state)
    }

    /// Claim the right to inject into `context`
    pub(crate) fn claim_injection(&self, context: ContextId) -> Claim {
        let mut link = self.links.entry(context).or_default();
        if link.state == Some(LinkState::Injected) {
            Claim::Done
        } else if link.injecting {
            Claim::Busy
        } else {
            link.injecting = true;
            Claim::Granted
        }
    }

    /// Release a [`Claim::Granted`] claim, marking the pair injected
    pub(crate) fn finish_injection(&self, context: ContextId) {
        let mut link = self.links.entry(context).or_default();
        link.state = Some(LinkState::Injected);
        link.injecting = false;
    }

    pub(crate) fn close(&self, context: ContextId) {
        self.closed.insert(context);
    }

    /// Drop everything remembered about `context`
    pub(crate) fn forget(&self, context: ContextId) {
        self.verdicts.invalidate(&context);
        self.links.remove(&context);
        self.closed.remove(&context);
    }
}
