//! Code-loading contexts
//!
//! A context resolves binary class names to class-file bytes and delegates to
//! its parent first. The bootstrap and system contexts additionally accept
//! classes appended to their global search path.

use parking_lot::RwLock;
use splice_scan::UnitSource;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Debug, Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of a code-loading context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(2);

impl ContextId {
    /// The bootstrap context; also stands in for "no context"
    pub const BOOTSTRAP: ContextId = ContextId(0);

    /// The system (application) context
    pub const SYSTEM: ContextId = ContextId(1);

    /// Allocate a fresh identity
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BOOTSTRAP => f.write_str("bootstrap"),
            Self::SYSTEM => f.write_str("system"),
            Self(id) => write!(f, "context#{id}"),
        }
    }
}

/// Role of a context in the delegation hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// Platform classes; root of every chain
    Bootstrap,
    /// Application class path
    System,
    /// Any other context, e.g. a web application or module
    Isolated,
}

impl ContextKind {
    /// Bootstrap and system contexts take injected classes on their search path
    #[inline]
    #[must_use]
    pub fn has_search_path(self) -> bool {
        matches!(self, ContextKind::Bootstrap | ContextKind::System)
    }
}

/// A class-loader-like namespace
pub trait CodeContext: UnitSource + Send + Sync + Debug {
    /// Identity, stable for the context's lifetime
    fn id(&self) -> ContextId;

    /// Role in the hierarchy
    fn kind(&self) -> ContextKind {
        ContextKind::Isolated
    }

    /// Parent consulted before this context
    fn parent(&self) -> Option<Arc<dyn CodeContext>>;

    /// Make `class_name` resolvable from this context's global search path
    ///
    /// # Errors
    /// Contexts without a search path return [`io::ErrorKind::Unsupported`].
    fn append_to_search_path(&self, class_name: &str, bytes: &[u8]) -> io::Result<()> {
        let _ = bytes;
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{} has no search path for {class_name}", self.id()),
        ))
    }
}

/// `context`, its parent, its parent's parent, up to the root
pub fn ancestry(context: Arc<dyn CodeContext>) -> impl Iterator<Item = Arc<dyn CodeContext>> {
    std::iter::successors(Some(context), |c| c.parent())
}

/// In-memory context with parent-first delegation
#[derive(Debug)]
pub struct MemoryContext {
    id: ContextId,
    kind: ContextKind,
    parent: Option<Arc<dyn CodeContext>>,
    units: RwLock<HashMap<String, Vec<u8>>>,
    appended: RwLock<Vec<String>>,
}

impl MemoryContext {
    fn with_identity(id: ContextId, kind: ContextKind, parent: Option<Arc<dyn CodeContext>>) -> Self {
        Self {
            id,
            kind,
            parent,
            units: RwLock::new(HashMap::new()),
            appended: RwLock::new(Vec::new()),
        }
    }

    /// Create a bootstrap context
    #[must_use]
    pub fn bootstrap() -> Self {
        Self::with_identity(ContextId::BOOTSTRAP, ContextKind::Bootstrap, None)
    }

    /// Create a system context under `parent`
    #[must_use]
    pub fn system(parent: Arc<dyn CodeContext>) -> Self {
        Self::with_identity(ContextId::SYSTEM, ContextKind::System, Some(parent))
    }

    /// Create an isolated context under `parent`
    #[must_use]
    pub fn isolated(parent: Arc<dyn CodeContext>) -> Self {
        Self::with_identity(ContextId::next(), ContextKind::Isolated, Some(parent))
    }

    /// With a class
    #[must_use]
    pub fn with_unit(self, class_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.define(class_name, bytes);
        self
    }

    /// Add or replace a class
    pub fn define(&self, class_name: impl Into<String>, bytes: Vec<u8>) {
        self.units.write().insert(class_name.into(), bytes);
    }

    /// True when this context itself (not a parent) holds `class_name`
    #[must_use]
    pub fn contains(&self, class_name: &str) -> bool {
        self.units.read().contains_key(class_name)
    }

    /// Classes appended to the search path, in order
    #[must_use]
    pub fn appended(&self) -> Vec<String> {
        self.appended.read().clone()
    }
}

impl UnitSource for MemoryContext {
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>> {
        if let Some(parent) = &self.parent {
            if let Some(bytes) = parent.read_unit(class_name)? {
                return Ok(Some(bytes));
            }
        }
        Ok(self.units.read().get(class_name).cloned())
    }
}

impl CodeContext for MemoryContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn kind(&self) -> ContextKind {
        self.kind
    }

    fn parent(&self) -> Option<Arc<dyn CodeContext>> {
        self.parent.clone()
    }

    fn append_to_search_path(&self, class_name: &str, bytes: &[u8]) -> io::Result<()> {
        if !self.kind.has_search_path() {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} has no search path for {class_name}", self.id),
            ));
        }
        self.define(class_name, bytes.to_vec());
        self.appended.write().push(class_name.to_string());
        Ok(())
    }
}

/// Context over a directory of `.class` files laid out by package
#[derive(Debug)]
pub struct DirContext {
    id: ContextId,
    root: PathBuf,
    parent: Option<Arc<dyn CodeContext>>,
}

impl DirContext {
    /// Create context over `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, parent: Option<Arc<dyn CodeContext>>) -> Self {
        Self {
            id: ContextId::next(),
            root: root.into(),
            parent,
        }
    }

    /// Directory served
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of every class under the directory
    ///
    /// # Errors
    /// Returns the first directory traversal failure.
    pub fn class_names(&self) -> io::Result<Vec<String>> {
        Ok(list_files(&self.root)?
            .into_keys()
            .filter_map(|path| class_name_of(&path))
            .collect())
    }
}

impl UnitSource for DirContext {
    fn read_unit(&self, class_name: &str) -> io::Result<Option<Vec<u8>>> {
        if let Some(parent) = &self.parent {
            if let Some(bytes) = parent.read_unit(class_name)? {
                return Ok(Some(bytes));
            }
        }
        match std::fs::read(self.root.join(class_path(class_name))) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl CodeContext for DirContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn parent(&self) -> Option<Arc<dyn CodeContext>> {
        self.parent.clone()
    }
}

/// Resource path of a class: `com.acme.Foo` to `com/acme/Foo.class`
#[must_use]
pub fn class_path(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

/// Class name of a resource path, if it names a class file
#[must_use]
pub fn class_name_of(path: &str) -> Option<String> {
    path.strip_suffix(".class")
        .filter(|stem| !stem.is_empty())
        .map(|stem| stem.replace('/', "."))
}

/// Every regular file under `root`, keyed by `/`-separated relative path
pub(crate) fn list_files(root: &Path) -> io::Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(key, path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_first_delegation() {
        let bootstrap: Arc<dyn CodeContext> =
            Arc::new(MemoryContext::bootstrap().with_unit("a.A", vec![1]));
        let child = MemoryContext::isolated(Arc::clone(&bootstrap))
            .with_unit("a.A", vec![2])
            .with_unit("a.B", vec![3]);
        assert_eq!(child.read_unit("a.A").unwrap(), Some(vec![1]));
        assert_eq!(child.read_unit("a.B").unwrap(), Some(vec![3]));
        assert_eq!(child.read_unit("a.C").unwrap(), None);
        assert_eq!(ancestry(Arc::new(child)).count(), 2);
    }

    #[test]
    fn only_platform_contexts_take_appends() {
        let bootstrap = Arc::new(MemoryContext::bootstrap());
        bootstrap.append_to_search_path("p.Helper", &[7]).unwrap();
        assert_eq!(bootstrap.appended(), vec!["p.Helper"]);

        let isolated = MemoryContext::isolated(bootstrap);
        let err = isolated.append_to_search_path("p.Helper", &[7]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn ids_are_distinct() {
        let a = ContextId::next();
        let b = ContextId::next();
        assert_ne!(a, b);
        assert_eq!(ContextId::BOOTSTRAP.to_string(), "bootstrap");
    }

    #[test]
    fn class_paths() {
        assert_eq!(class_path("com.acme.Outer$Inner"), "com/acme/Outer$Inner.class");
        assert_eq!(class_name_of("com/acme/Foo.class").as_deref(), Some("com.acme.Foo"));
        assert_eq!(class_name_of("META-INF/MANIFEST.MF"), None);
    }

    #[test]
    fn directory_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("com/acme")).unwrap();
        std::fs::write(dir.path().join("com/acme/Foo.class"), [0xca, 0xfe]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let ctx = DirContext::new(dir.path(), None);
        assert_eq!(ctx.read_unit("com.acme.Foo").unwrap(), Some(vec![0xca, 0xfe]));
        assert_eq!(ctx.read_unit("com.acme.Bar").unwrap(), None);
        assert_eq!(ctx.class_names().unwrap(), vec!["com.acme.Foo"]);
    }
}
