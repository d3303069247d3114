//! Injection engine behavior across contexts and threads

use pretty_assertions::assert_eq;
use splice_fingerprint::{ClassFingerprint, LibraryFingerprint, MethodFingerprint};
use splice_inject::{
    CodeContext, ContextId, ContextKind, ContextRegistry, DefineGuard, InjectConfig, Injector, LinkState,
    MemoryContext, PluginBundle,
};
use splice_scan::UnitSource;
use splice_test_utils::{ClassWriter, MethodDef};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

fn class_a() -> Vec<u8> {
    ClassWriter::new("lib.A")
        .method(MethodDef::public("foo", "(I)V"))
        .build()
}

fn requires(method: &str) -> LibraryFingerprint {
    LibraryFingerprint::new(vec![ClassFingerprint::builder("lib.A")
        .method(MethodFingerprint::new(method, None, vec!["int".into()], vec![]))
        .build()])
}

struct Host {
    injector: Injector,
    app: Arc<dyn CodeContext>,
}

fn host_with(app: impl FnOnce(Arc<dyn CodeContext>) -> Arc<dyn CodeContext>, config: InjectConfig) -> Host {
    let bootstrap: Arc<dyn CodeContext> = Arc::new(MemoryContext::bootstrap());
    let system: Arc<dyn CodeContext> = Arc::new(MemoryContext::system(Arc::clone(&bootstrap)));
    let app = app(Arc::clone(&system));
    Host {
        injector: Injector::new(Arc::new(ContextRegistry::new(bootstrap, system)), config),
        app,
    }
}

fn host() -> Host {
    host_with(
        |system| -> Arc<dyn CodeContext> {
            Arc::new(MemoryContext::isolated(system).with_unit("lib.A", class_a()))
        },
        InjectConfig::new(),
    )
}

#[test]
fn only_compatible_plugins_are_served() {
    let host = host();
    let p1 = host
        .injector
        .register(
            PluginBundle::new("p1")
                .with_fingerprint(requires("bar"))
                .with_class("p1.Helper", vec![1]),
        )
        .unwrap();
    let p2 = host
        .injector
        .register(
            PluginBundle::new("p2")
                .with_fingerprint(requires("foo"))
                .with_class("p2.Helper", vec![2]),
        )
        .unwrap();

    assert_eq!(host.injector.link(&p1, Some(&host.app)), LinkState::Incompatible);
    assert_eq!(host.injector.link(&p2, Some(&host.app)), LinkState::Injected);

    assert!(host.injector.find_class(Some(&host.app), "p1.Helper").is_none());
    let found = host.injector.find_class(Some(&host.app), "p2.Helper").unwrap();
    assert_eq!(&*found.bytes, &[2]);
    assert_eq!(found.location.to_string(), "plugin://p2/p2/Helper.class");

    let errors = p1.verdict(host.app.id()).unwrap();
    assert_eq!(errors.errors().len(), 1);
    assert_eq!(errors.errors()[0].class_name(), "lib.A");
}

#[derive(Debug)]
struct CountingContext {
    inner: MemoryContext,
    reads: AtomicUsize,
}

impl UnitSource for CountingContext {
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>> {
        if class_name == "lib.A" {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.read_unit(class_name)
    }
}

impl CodeContext for CountingContext {
    fn id(&self) -> ContextId {
        self.inner.id()
    }

    fn parent(&self) -> Option<Arc<dyn CodeContext>> {
        self.inner.parent()
    }
}

#[test]
fn concurrent_checks_scan_once() {
    let counting = Arc::new(std::sync::OnceLock::new());
    let slot = Arc::clone(&counting);
    let host = host_with(
        move |system| -> Arc<dyn CodeContext> {
            let ctx = Arc::new(CountingContext {
                inner: MemoryContext::isolated(system).with_unit("lib.A", class_a()),
                reads: AtomicUsize::new(0),
            });
            let _ = slot.set(Arc::clone(&ctx));
            ctx
        },
        InjectConfig::new(),
    );
    let plugin = host
        .injector
        .register(PluginBundle::new("p").with_fingerprint(requires("foo")))
        .unwrap();

    let threads = 8;
    let barrier = Barrier::new(threads);
    let results: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    host.injector.is_compatible(&plugin, Some(&host.app))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.iter().all(|ok| *ok));
    assert_eq!(counting.get().unwrap().reads.load(Ordering::SeqCst), 1);
}

#[test]
fn deferred_injection_completes_on_next_lookup() {
    let host = host();
    let plugin = host
        .injector
        .register(
            PluginBundle::new("p")
                .with_fingerprint(requires("foo"))
                .with_class("p.Helper", vec![9]),
        )
        .unwrap();

    {
        let _defining = DefineGuard::enter();
        assert_eq!(host.injector.link(&plugin, Some(&host.app)), LinkState::Deferred);
        assert!(host.injector.find_class(Some(&host.app), "p.Helper").is_none());
    }
    assert_eq!(plugin.link_state(host.app.id()), Some(LinkState::Deferred));

    let found = host.injector.find_class(Some(&host.app), "p.Helper").unwrap();
    assert_eq!(&*found.bytes, &[9]);
    assert_eq!(plugin.link_state(host.app.id()), Some(LinkState::Injected));
}

#[test]
fn concurrent_links_append_once() {
    for _ in 0..50 {
        let bootstrap = Arc::new(MemoryContext::bootstrap());
        let bootstrap_ctx: Arc<dyn CodeContext> = bootstrap.clone();
        let system: Arc<dyn CodeContext> = Arc::new(MemoryContext::system(Arc::clone(&bootstrap_ctx)));
        let injector = Injector::new(
            Arc::new(ContextRegistry::new(bootstrap_ctx, system)),
            InjectConfig::new(),
        );
        let plugin = injector
            .register(
                PluginBundle::new("p")
                    .with_fingerprint(LibraryFingerprint::default())
                    .with_class("p.H", vec![1])
                    .with_class("p.K", vec![2]),
            )
            .unwrap();

        let threads = 4;
        let barrier = Barrier::new(threads);
        let states: Vec<LinkState> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        injector.link(&plugin, None)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(states.contains(&LinkState::Injected));
        assert!(states.iter().all(|state| *state != LinkState::Incompatible));

        // settles any link deferred by a losing thread
        injector.find_class(None, "p.H");
        injector.link(&plugin, None);

        assert_eq!(plugin.link_state(ContextId::BOOTSTRAP), Some(LinkState::Injected));
        assert_eq!(bootstrap.appended(), vec!["p.H", "p.K"]);
    }
}

#[derive(Debug)]
struct FlakyBootstrap {
    inner: MemoryContext,
}

impl UnitSource for FlakyBootstrap {
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>> {
        self.inner.read_unit(class_name)
    }
}

impl CodeContext for FlakyBootstrap {
    fn id(&self) -> ContextId {
        ContextId::BOOTSTRAP
    }

    fn kind(&self) -> ContextKind {
        ContextKind::Bootstrap
    }

    fn parent(&self) -> Option<Arc<dyn CodeContext>> {
        None
    }

    fn append_to_search_path(&self, class_name: &str, bytes: &[u8]) -> io::Result<()> {
        if class_name.contains("Broken") {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        self.inner.append_to_search_path(class_name, bytes)
    }
}

#[test]
fn bootstrap_append_skips_failures() {
    let bootstrap = Arc::new(FlakyBootstrap {
        inner: MemoryContext::bootstrap(),
    });
    let bootstrap_ctx: Arc<dyn CodeContext> = bootstrap.clone();
    let system: Arc<dyn CodeContext> = Arc::new(MemoryContext::system(Arc::clone(&bootstrap_ctx)));
    let injector = Injector::new(
        Arc::new(ContextRegistry::new(bootstrap_ctx, system)),
        InjectConfig::new(),
    );
    let plugin = injector
        .register(
            PluginBundle::new("p")
                .with_fingerprint(LibraryFingerprint::default())
                .with_class("p.Broken", vec![1])
                .with_class("p.Good", vec![2])
                .with_class("p.Other", vec![3]),
        )
        .unwrap();

    assert_eq!(injector.link(&plugin, None), LinkState::Injected);
    assert_eq!(bootstrap.inner.appended(), vec!["p.Good", "p.Other"]);
    assert!(injector.registry().associated(ContextId::BOOTSTRAP).is_empty());
}

#[test]
fn undetermined_checks_follow_policy() {
    let broken = |system: Arc<dyn CodeContext>| -> Arc<dyn CodeContext> {
        Arc::new(MemoryContext::isolated(system).with_unit("lib.A", vec![0xca, 0xfe, 0xba, 0xbe]))
    };
    let fingerprint = requires("foo");

    let permissive = host_with(broken, InjectConfig::new());
    let plugin = permissive
        .injector
        .register(PluginBundle::new("p").with_fingerprint(fingerprint.clone()))
        .unwrap();
    assert!(permissive.injector.is_compatible(&plugin, Some(&permissive.app)));

    let strict = host_with(broken, InjectConfig::new().with_fail_on_missing_fingerprint(true));
    let plugin = strict
        .injector
        .register(PluginBundle::new("p").with_fingerprint(fingerprint))
        .unwrap();
    assert!(!strict.injector.is_compatible(&plugin, Some(&strict.app)));
}
