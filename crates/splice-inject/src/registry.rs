//! Context registry
//!
//! Holds the bootstrap and system contexts and the association of each target
//! context with the plugin contexts injected into it. One registry is shared
//! by reference across every thread of the host.

use crate::context::{CodeContext, ContextId};
use crate::plugin::PluginContext;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Platform contexts and target-to-plugin associations
#[derive(Debug)]
pub struct ContextRegistry {
    bootstrap: Arc<dyn CodeContext>,
    system: Arc<dyn CodeContext>,
    associations: DashMap<ContextId, Vec<Arc<PluginContext>>>,
}

impl ContextRegistry {
    /// Create registry over the platform contexts
    #[must_use]
    pub fn new(bootstrap: Arc<dyn CodeContext>, system: Arc<dyn CodeContext>) -> Self {
        Self {
            bootstrap,
            system,
            associations: DashMap::new(),
        }
    }

    /// The bootstrap context
    #[inline]
    #[must_use]
    pub fn bootstrap(&self) -> &Arc<dyn CodeContext> {
        &self.bootstrap
    }

    /// The system context
    #[inline]
    #[must_use]
    pub fn system(&self) -> &Arc<dyn CodeContext> {
        &self.system
    }

    /// The context a request refers to; `None` means bootstrap
    #[must_use]
    pub fn resolve(&self, context: Option<&Arc<dyn CodeContext>>) -> Arc<dyn CodeContext> {
        Arc::clone(context.unwrap_or(&self.bootstrap))
    }

    /// Associate a plugin with a target context; false if already associated
    pub fn associate(&self, target: ContextId, plugin: Arc<PluginContext>) -> bool {
        let mut plugins = self.associations.entry(target).or_default();
        if plugins.iter().any(|p| Arc::ptr_eq(p, &plugin)) {
            return false;
        }
        debug!(plugin = plugin.name(), context = %target, "associated");
        plugins.push(plugin);
        true
    }

    /// Plugins associated with a target context, in association order
    #[must_use]
    pub fn associated(&self, target: ContextId) -> Vec<Arc<PluginContext>> {
        self.associations
            .get(&target)
            .map(|plugins| plugins.clone())
            .unwrap_or_default()
    }

    /// Drop the associations of a context that has gone away
    pub fn forget(&self, target: ContextId) -> Vec<Arc<PluginContext>> {
        self.associations
            .remove(&target)
            .map(|(_, plugins)| plugins)
            .unwrap_or_default()
    }
}
