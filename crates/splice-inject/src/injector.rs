//! Injection engine
//!
//! For each (plugin, target context) pair the injector decides once whether the
//! context satisfies the plugin's fingerprint, then makes the plugin's classes
//! reachable from it:
//!
//! ```text
//! unknown --check--> Incompatible
//!         --check--> compatible --defining--> Deferred --next lookup--> Injected
//!                               --otherwise-------------------------> Injected
//! ```
//!
//! Bootstrap and system targets receive the classes on their search path;
//! other targets are associated with the plugin and served through
//! [`Injector::find_class`] and [`Injector::find_resource`], which walk the
//! target's ancestry like a normal delegated load.

use crate::config::InjectConfig;
use crate::context::{ancestry, class_path, CodeContext, ContextId};
use crate::guard::{DefineGuard, InFlight, InFlightKey};
use crate::plugin::{BundleError, Claim, LinkState, PluginBundle, PluginContext};
use crate::registry::ContextRegistry;
use parking_lot::RwLock;
use splice_scan::{CompatibilityChecker, Verdict};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a plugin resource is served from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocation {
    /// Bundle name
    pub bundle: String,
    /// `/`-separated path inside the bundle
    pub path: String,
}

impl Display for ResourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "plugin://{}/{}", self.bundle, self.path)
    }
}

/// A resource found for a lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Origin
    pub location: ResourceLocation,
    /// Content
    pub bytes: Arc<[u8]>,
}

/// Decides compatibility per context and serves plugin classes
#[derive(Debug)]
pub struct Injector {
    registry: Arc<ContextRegistry>,
    config: InjectConfig,
    plugins: RwLock<Vec<Arc<PluginContext>>>,
}

impl Injector {
    /// Create injector over a shared registry
    #[must_use]
    pub fn new(registry: Arc<ContextRegistry>, config: InjectConfig) -> Self {
        Self {
            registry,
            config,
            plugins: RwLock::new(Vec::new()),
        }
    }

    /// Shared registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ContextRegistry> {
        &self.registry
    }

    /// Register a bundle
    ///
    /// # Errors
    /// Returns [`BundleError::Duplicate`] when the name is taken.
    pub fn register(&self, bundle: PluginBundle) -> Result<Arc<PluginContext>, BundleError> {
        let mut plugins = self.plugins.write();
        if plugins.iter().any(|p| p.name() == bundle.name()) {
            return Err(BundleError::Duplicate(bundle.name().to_string()));
        }
        let plugin = Arc::new(PluginContext::new(bundle, self.config.verdict_cache_capacity));
        info!(
            plugin = plugin.name(),
            resources = plugin.bundle().len(),
            fingerprinted = plugin.bundle().fingerprint().is_some(),
            "plugin registered"
        );
        plugins.push(Arc::clone(&plugin));
        Ok(plugin)
    }

    /// Registered plugin by name
    #[must_use]
    pub fn plugin(&self, name: &str) -> Option<Arc<PluginContext>> {
        self.plugins.read().iter().find(|p| p.name() == name).cloned()
    }

    /// Whether `plugin` may be injected into `context`
    ///
    /// The verdict is computed at most once per context. A recursive check of
    /// the same pair on the same thread answers `false` without caching.
    pub fn is_compatible(&self, plugin: &PluginContext, context: Option<&Arc<dyn CodeContext>>) -> bool {
        self.check(plugin, &self.registry.resolve(context)).unwrap_or(false)
    }

    /// Policy decision for the pair, or `None` when this thread is already checking it
    fn check(&self, plugin: &PluginContext, target: &Arc<dyn CodeContext>) -> Option<bool> {
        let Some(fingerprint) = plugin.bundle().fingerprint() else {
            let allowed = !self.config.fail_on_missing_fingerprint;
            debug!(plugin = plugin.name(), allowed, "no fingerprint; applying policy");
            return Some(allowed);
        };
        let Some(_in_flight) = InFlight::enter(InFlightKey::Check {
            plugin: plugin.name().to_string(),
            context: target.id(),
        }) else {
            debug!(plugin = plugin.name(), context = %target.id(), "recursive check suppressed");
            return None;
        };

        let verdict = plugin.verdict_with(target.id(), || {
            let verdict = CompatibilityChecker::new(&**target).check(fingerprint);
            info!(
                plugin = plugin.name(),
                context = %target.id(),
                compatible = verdict.is_compatible(),
                "compatibility checked"
            );
            for error in verdict.errors() {
                debug!(plugin = plugin.name(), %error, "incompatible");
            }
            verdict
        });
        Some(match verdict {
            Verdict::Compatible => true,
            Verdict::Incompatible(_) => false,
            Verdict::Undetermined { .. } => !self.config.fail_on_missing_fingerprint,
        })
    }

    /// Make `plugin` reachable from `context` if compatible
    ///
    /// Inside a [`DefineGuard`] the link is deferred and completed by the next
    /// lookup made outside one. Concurrent callers inject at most once: a
    /// caller that finds an injection running reports it as deferred.
    pub fn link(&self, plugin: &Arc<PluginContext>, context: Option<&Arc<dyn CodeContext>>) -> LinkState {
        let target = self.registry.resolve(context);
        let id = target.id();
        if plugin.link_state(id) == Some(LinkState::Injected) {
            return LinkState::Injected;
        }
        match self.check(plugin, &target) {
            Some(true) => {}
            Some(false) => return plugin.settle(id, LinkState::Incompatible),
            // the outer check of this pair on this thread completes the link
            None => return plugin.link_state(id).unwrap_or(LinkState::Deferred),
        }
        if DefineGuard::is_active() {
            debug!(plugin = plugin.name(), context = %id, "defining; injection deferred");
            return plugin.settle(id, LinkState::Deferred);
        }
        match plugin.claim_injection(id) {
            Claim::Granted => {}
            Claim::Done => return LinkState::Injected,
            Claim::Busy => {
                debug!(plugin = plugin.name(), context = %id, "injection running elsewhere; deferred");
                return plugin.settle(id, LinkState::Deferred);
            }
        }

        if target.kind().has_search_path() {
            append_classes(plugin, target.as_ref());
        } else {
            self.registry.associate(id, Arc::clone(plugin));
        }
        plugin.finish_injection(id);
        info!(plugin = plugin.name(), context = %id, "plugin injected");
        LinkState::Injected
    }

    /// Class bytes for `class_name` as seen from `context`
    ///
    /// `None` means "resolve normally", never an error.
    pub fn find_class(&self, context: Option<&Arc<dyn CodeContext>>, class_name: &str) -> Option<Resource> {
        self.find_resource(context, &class_path(class_name))
    }

    /// Resource at `path` as seen from `context`
    ///
    /// Completes deferred links of the target's ancestry, then searches the
    /// plugins of the nearest ancestor that has any, skipping plugins closed
    /// for that ancestor. A lookup that re-enters itself on the same thread for the same
    /// context and path answers `None`.
    pub fn find_resource(&self, context: Option<&Arc<dyn CodeContext>>, path: &str) -> Option<Resource> {
        let target = self.registry.resolve(context);
        let Some(_in_flight) = InFlight::enter(InFlightKey::Lookup {
            context: target.id(),
            name: path.to_string(),
        }) else {
            debug!(context = %target.id(), path, "recursive lookup suppressed");
            return None;
        };
        if !DefineGuard::is_active() {
            self.settle_deferred(&target);
        }

        for ancestor in ancestry(target) {
            let id = ancestor.id();
            let plugins = self.registry.associated(id);
            if plugins.is_empty() {
                continue;
            }
            for plugin in plugins.iter().filter(|p| !p.is_closed(id)) {
                if let Some(bytes) = plugin.bundle().resource(path) {
                    debug!(plugin = plugin.name(), context = %id, path, "served from plugin");
                    return Some(Resource {
                        location: ResourceLocation {
                            bundle: plugin.name().to_string(),
                            path: path.to_string(),
                        },
                        bytes: Arc::clone(bytes),
                    });
                }
            }
            return None;
        }
        None
    }

    /// Stop serving `plugin` to lookups made on behalf of `context`
    pub fn close(&self, plugin: &PluginContext, context: Option<&Arc<dyn CodeContext>>) {
        let id = self.registry.resolve(context).id();
        plugin.close(id);
        debug!(plugin = plugin.name(), context = %id, "closed");
    }

    /// Drop everything known about a context that has gone away
    pub fn forget(&self, context: ContextId) {
        self.registry.forget(context);
        for plugin in self.plugins.read().iter() {
            plugin.forget(context);
        }
        debug!(%context, "context forgotten");
    }

    fn settle_deferred(&self, target: &Arc<dyn CodeContext>) {
        let plugins = self.plugins.read().clone();
        for ancestor in ancestry(Arc::clone(target)) {
            for plugin in &plugins {
                if plugin.link_state(ancestor.id()) == Some(LinkState::Deferred) {
                    self.link(plugin, Some(&ancestor));
                }
            }
        }
    }
}

/// Append every class of the bundle to a platform search path
///
/// A class that cannot be appended is skipped with a warning.
fn append_classes(plugin: &PluginContext, target: &dyn CodeContext) {
    let mut appended = 0usize;
    for (class_name, bytes) in plugin.bundle().classes() {
        match target.append_to_search_path(&class_name, bytes) {
            Ok(()) => appended += 1,
            Err(err) => warn!(
                plugin = plugin.name(),
                class = %class_name,
                error = %err,
                "cannot append class; skipping"
            ),
        }
    }
    debug!(plugin = plugin.name(), context = %target.id(), appended, "appended to search path");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryContext;
    use splice_fingerprint::{ClassFingerprint, LibraryFingerprint, MethodFingerprint};
    use splice_scan::UnitSource;
    use splice_test_utils::{ClassWriter, MethodDef};

    fn injector(config: InjectConfig) -> (Injector, Arc<dyn CodeContext>) {
        let bootstrap: Arc<dyn CodeContext> = Arc::new(MemoryContext::bootstrap());
        let system: Arc<dyn CodeContext> = Arc::new(MemoryContext::system(Arc::clone(&bootstrap)));
        let app: Arc<dyn CodeContext> = Arc::new(MemoryContext::isolated(Arc::clone(&system)));
        let registry = Arc::new(ContextRegistry::new(bootstrap, system));
        (Injector::new(registry, config), app)
    }

    #[test]
    fn unfingerprinted_plugins_follow_policy() {
        let (permissive, app) = injector(InjectConfig::new());
        let plugin = permissive.register(PluginBundle::new("p")).unwrap();
        assert!(permissive.is_compatible(&plugin, Some(&app)));

        let (strict, app) = injector(InjectConfig::new().with_fail_on_missing_fingerprint(true));
        let plugin = strict.register(PluginBundle::new("p")).unwrap();
        assert_eq!(strict.link(&plugin, Some(&app)), LinkState::Incompatible);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let (injector, _) = injector(InjectConfig::new());
        injector.register(PluginBundle::new("p")).unwrap();
        assert!(matches!(
            injector.register(PluginBundle::new("p")),
            Err(BundleError::Duplicate(name)) if name == "p"
        ));
        assert!(injector.plugin("p").is_some());
    }

    #[test]
    fn closed_plugins_are_skipped() {
        let (injector, app) = injector(InjectConfig::new());
        let plugin = injector
            .register(PluginBundle::new("p").with_class("p.Helper", vec![1]))
            .unwrap();
        assert_eq!(injector.link(&plugin, Some(&app)), LinkState::Injected);
        assert!(injector.find_class(Some(&app), "p.Helper").is_some());

        injector.close(&plugin, Some(&app));
        assert!(injector.find_class(Some(&app), "p.Helper").is_none());
    }

    #[test]
    fn lookups_delegate_to_the_nearest_linked_ancestor() {
        let (injector, app) = injector(InjectConfig::new());
        let plugin = injector
            .register(PluginBundle::new("p").with_class("p.Helper", vec![1]))
            .unwrap();
        let parent = app.parent().unwrap();
        // system context: classes go on its search path, nothing is associated
        assert_eq!(injector.link(&plugin, Some(&parent)), LinkState::Injected);
        assert!(injector.find_class(Some(&app), "p.Helper").is_none());
        assert_eq!(parent.read_unit("p.Helper").unwrap(), Some(vec![1]));

        let child: Arc<dyn CodeContext> = Arc::new(MemoryContext::isolated(Arc::clone(&app)));
        injector.link(&plugin, Some(&app));
        let found = injector.find_class(Some(&child), "p.Helper").unwrap();
        assert_eq!(found.location.to_string(), "plugin://p/p/Helper.class");
    }

    #[test]
    fn forget_resets_a_context() {
        let (injector, app) = injector(InjectConfig::new());
        let plugin = injector
            .register(PluginBundle::new("p").with_class("p.Helper", vec![1]))
            .unwrap();
        injector.link(&plugin, Some(&app));
        injector.forget(app.id());
        assert_eq!(plugin.link_state(app.id()), None);
        assert!(injector.find_class(Some(&app), "p.Helper").is_none());
    }

    /// Context whose reads re-enter the injector the way a load hook does
    #[derive(Debug)]
    struct HookedContext {
        inner: MemoryContext,
        injector: std::sync::OnceLock<Arc<Injector>>,
        this: std::sync::OnceLock<std::sync::Weak<HookedContext>>,
        seen: parking_lot::Mutex<Vec<(bool, Option<LinkState>)>>,
    }

    impl UnitSource for HookedContext {
        fn read_unit(&self, class_name: &str) -> std::io::Result<Option<Vec<u8>>> {
            let this = self.this.get().and_then(std::sync::Weak::upgrade);
            if let (true, Some(injector), Some(this)) = (class_name == "lib.A", self.injector.get(), this) {
                let this: Arc<dyn CodeContext> = this;
                let found = injector.find_class(Some(&this), "p.Helper").is_some();
                let plugin = injector.plugin("p").unwrap();
                self.seen.lock().push((found, plugin.link_state(this.id())));
            }
            self.inner.read_unit(class_name)
        }
    }

    impl CodeContext for HookedContext {
        fn id(&self) -> ContextId {
            self.inner.id()
        }

        fn parent(&self) -> Option<Arc<dyn CodeContext>> {
            self.inner.parent()
        }
    }

    #[test]
    fn reentrant_lookup_of_the_same_name_is_suppressed() {
        let bootstrap: Arc<dyn CodeContext> = Arc::new(MemoryContext::bootstrap());
        let system: Arc<dyn CodeContext> = Arc::new(MemoryContext::system(Arc::clone(&bootstrap)));
        let class_a = ClassWriter::new("lib.A").method(MethodDef::public("foo", "()V")).build();
        let hooked = Arc::new(HookedContext {
            inner: MemoryContext::isolated(Arc::clone(&system)).with_unit("lib.A", class_a),
            injector: std::sync::OnceLock::new(),
            this: std::sync::OnceLock::new(),
            seen: parking_lot::Mutex::new(Vec::new()),
        });
        let injector = Arc::new(Injector::new(
            Arc::new(ContextRegistry::new(bootstrap, system)),
            InjectConfig::new(),
        ));
        let fingerprint = LibraryFingerprint::new(vec![ClassFingerprint::builder("lib.A")
            .method(MethodFingerprint::new("foo", None, vec![], vec![]))
            .build()]);
        let plugin = injector
            .register(
                PluginBundle::new("p")
                    .with_fingerprint(fingerprint)
                    .with_class("p.Helper", vec![7]),
            )
            .unwrap();
        hooked.this.set(Arc::downgrade(&hooked)).unwrap();
        hooked.injector.set(Arc::clone(&injector)).unwrap();
        let app: Arc<dyn CodeContext> = hooked.clone();

        // deferred pair whose verdict is not cached yet
        plugin.settle(app.id(), LinkState::Deferred);
        let found = injector.find_class(Some(&app), "p.Helper").unwrap();

        assert_eq!(&*found.bytes, &[7]);
        assert_eq!(hooked.seen.lock().clone(), vec![(false, Some(LinkState::Deferred))]);
        assert_eq!(plugin.link_state(app.id()), Some(LinkState::Injected));
    }
}
