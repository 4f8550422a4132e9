//! # Handler lookup table.
//!
//! [`HandlerSet`] maps handler keys (the `handler` field of a
//! [`TaskDescriptor`](crate::TaskDescriptor)) to registered [`RunnableRef`]s.
//! The registry consults this table at arm time; descriptors naming an
//! unregistered handler are per-task load errors.
//!
//! Callers register capabilities explicitly — the scheduler never performs any
//! dynamic class/body resolution of its own.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::tasks::runnable::RunnableRef;

/// Keyed lookup table of task bodies.
#[derive(Default)]
pub struct HandlerSet {
    inner: RwLock<HashMap<String, RunnableRef>>,
}

impl HandlerSet {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the handler for `name`.
    pub fn register(&self, name: impl Into<String>, runnable: RunnableRef) {
        self.inner
            .write()
            .expect("handler table poisoned")
            .insert(name.into(), runnable);
    }

    /// Removes the handler for `name`. Returns true if one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.inner
            .write()
            .expect("handler table poisoned")
            .remove(name)
            .is_some()
    }

    /// Resolves `name` to a shared handle.
    pub fn resolve(&self, name: &str) -> Option<RunnableRef> {
        self.inner
            .read()
            .expect("handler table poisoned")
            .get(name)
            .cloned()
    }

    /// Sorted list of registered handler names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .read()
            .expect("handler table poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort_unstable();
        names
    }
}
