//! Thread-local re-entrancy state
//!
//! [`DefineGuard`] marks the current thread as being inside a class
//! definition; injection confirmed in that state is deferred. In-flight marks
//! break same-thread recursion through the lookup path while leaving other
//! threads free to perform the same lookup.

use crate::context::ContextId;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::marker::PhantomData;

thread_local! {
    static DEFINING: Cell<usize> = const { Cell::new(0) };
    static IN_FLIGHT: RefCell<HashSet<InFlightKey>> = RefCell::new(HashSet::new());
}

/// Marks the current thread as defining a class until dropped
///
/// Guards nest. Not `Send`: the mark belongs to the thread that created it.
#[derive(Debug)]
#[must_use = "the thread is only marked while the guard is alive"]
pub struct DefineGuard {
    _thread_bound: PhantomData<*const ()>,
}

impl DefineGuard {
    /// Enter a class definition
    pub fn enter() -> Self {
        DEFINING.with(|depth| depth.set(depth.get() + 1));
        Self {
            _thread_bound: PhantomData,
        }
    }

    /// True while any guard is alive on this thread
    #[must_use]
    pub fn is_active() -> bool {
        DEFINING.with(|depth| depth.get() > 0)
    }
}

impl Drop for DefineGuard {
    fn drop(&mut self) {
        DEFINING.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Work that must not recurse into itself on one thread
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum InFlightKey {
    /// Compatibility check of a plugin against a context
    Check { plugin: String, context: ContextId },
    /// Lookup of a resource name on behalf of a context
    Lookup { context: ContextId, name: String },
}

/// Holds an in-flight mark; removed on drop
#[derive(Debug)]
pub(crate) struct InFlight {
    key: InFlightKey,
    _thread_bound: PhantomData<*const ()>,
}

impl InFlight {
    /// Mark `key`, or `None` if this thread already holds it
    pub(crate) fn enter(key: InFlightKey) -> Option<Self> {
        let inserted = IN_FLIGHT.with(|set| set.borrow_mut().insert(key.clone()));
        inserted.then_some(Self {
            key,
            _thread_bound: PhantomData,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        IN_FLIGHT.with(|set| set.borrow_mut().remove(&self.key));
    }
}
