//! Splice Inject
//!
//! Attach-time half of splice: caches, per target code-loading context, whether
//! a plugin's fingerprint holds, and makes compatible plugins' classes loadable
//! from that context exactly once.
//!
//! # Core Concepts
//!
//! - [`CodeContext`]: a parent-delegating namespace of class files
//! - [`ContextRegistry`]: platform contexts and target-to-plugin associations
//! - [`PluginBundle`] / [`PluginContext`]: a plugin's classes, fingerprint and per-context state
//! - [`Injector`]: `is_compatible`, `link`, `find_class`, `find_resource`
//! - [`DefineGuard`]: marks a thread as defining a class so injection is deferred
//!
//! # Example
//!
//! ```rust
//! use splice_inject::{
//!     CodeContext, ContextRegistry, InjectConfig, Injector, LinkState, MemoryContext, PluginBundle,
//! };
//! use std::sync::Arc;
//!
//! let bootstrap: Arc<dyn CodeContext> = Arc::new(MemoryContext::bootstrap());
//! let system: Arc<dyn CodeContext> = Arc::new(MemoryContext::system(bootstrap.clone()));
//! let app: Arc<dyn CodeContext> = Arc::new(MemoryContext::isolated(system.clone()));
//!
//! let injector = Injector::new(Arc::new(ContextRegistry::new(bootstrap, system)), InjectConfig::new());
//! let plugin = injector
//!     .register(PluginBundle::new("tracer").with_class("tracer.Helper", vec![0xca, 0xfe]))
//!     .unwrap();
//!
//! assert_eq!(injector.link(&plugin, Some(&app)), LinkState::Injected);
//! let found = injector.find_class(Some(&app), "tracer.Helper").unwrap();
//! assert_eq!(found.location.to_string(), "plugin://tracer/tracer/Helper.class");
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod context;
mod guard;
mod injector;
mod plugin;
mod registry;

pub use config::{ConfigError, InjectConfig};
pub use context::{
    ancestry, class_name_of, class_path, CodeContext, ContextId, ContextKind, DirContext, MemoryContext,
};
pub use guard::DefineGuard;
pub use injector::{Injector, Resource, ResourceLocation};
pub use plugin::{BundleError, LinkState, PluginBundle, PluginContext};
pub use registry::ContextRegistry;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
