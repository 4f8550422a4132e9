//! # ListenerSet: isolated fan-out over registered listeners.
//!
//! [`ListenerSet`] holds the registered [`TaskListener`]s and notifies each of
//! them in registration order when a firing completes.
//!
//! ## What it guarantees
//! - Every registered listener is invoked for every outcome.
//! - A panicking listener is caught and reported; the remaining listeners are
//!   still notified.
//! - Registration and removal never observe a listener mid-notification: the
//!   set is snapshotted under the lock before fan-out.
//!
//! ## What it does **not** guarantee
//! - No concurrency across listeners: notification is sequential, as part of
//!   the firing sequence, so re-arming strictly follows the last listener.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::RwLock;

use crate::error::TaskError;
use crate::listeners::listener::TaskListener;
use crate::tasks::TaskDescriptor;

/// Registered listeners with panic-isolated fan-out.
#[derive(Default)]
pub struct ListenerSet {
    inner: RwLock<Vec<Arc<dyn TaskListener>>>,
}

impl ListenerSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set pre-populated with `listeners`.
    pub fn with(listeners: Vec<Arc<dyn TaskListener>>) -> Self {
        Self {
            inner: RwLock::new(listeners),
        }
    }

    /// Appends a listener.
    pub async fn add(&self, listener: Arc<dyn TaskListener>) {
        self.inner.write().await.push(listener);
    }

    /// Removes all listeners with the given name. Returns true if any were
    /// removed.
    pub async fn remove(&self, name: &str) -> bool {
        let mut listeners = self.inner.write().await;
        let before = listeners.len();
        listeners.retain(|l| l.name() != name);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// True if no listeners are registered.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Notifies every listener of a successful firing.
    pub async fn notify_success(&self, task: &TaskDescriptor) {
        for listener in self.snapshot().await {
            let fut = listener.on_success(task);
            if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                report_panic(listener.name(), &panic_err);
            }
        }
    }

    /// Notifies every listener of a failed firing.
    pub async fn notify_failure(&self, task: &TaskDescriptor, error: &TaskError) {
        for listener in self.snapshot().await {
            let fut = listener.on_failure(task, error);
            if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                report_panic(listener.name(), &panic_err);
            }
        }
    }

    /// Snapshot taken under the lock so fan-out never holds it across awaits.
    async fn snapshot(&self) -> Vec<Arc<dyn TaskListener>> {
        self.inner.read().await.clone()
    }
}

fn report_panic(name: &str, payload: &(dyn std::any::Any + Send)) {
    let info = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    };
    eprintln!("[chronovisor] listener '{name}' panicked: {info}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskId;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        hits: AtomicUsize,
        failures: AtomicUsize,
    }

    impl Counting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                hits: AtomicUsize::new(0),
                failures: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TaskListener for Counting {
        async fn on_success(&self, _task: &TaskDescriptor) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_failure(&self, _task: &TaskDescriptor, _error: &TaskError) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct Exploding;

    #[async_trait]
    impl TaskListener for Exploding {
        async fn on_success(&self, _task: &TaskDescriptor) {
            panic!("listener blew up");
        }

        async fn on_failure(&self, _task: &TaskDescriptor, _error: &TaskError) {
            panic!("listener blew up");
        }

        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    fn descriptor() -> TaskDescriptor {
        TaskDescriptor::new(
            TaskId(1),
            "h",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_all_listeners_notified() {
        let set = ListenerSet::new();
        let a = Counting::new();
        let b = Counting::new();
        set.add(a.clone()).await;
        set.add(b.clone()).await;

        set.notify_success(&descriptor()).await;
        set.notify_failure(&descriptor(), &TaskError::fail("boom")).await;

        assert_eq!(a.hits.load(Ordering::SeqCst), 1);
        assert_eq!(b.hits.load(Ordering::SeqCst), 1);
        assert_eq!(a.failures.load(Ordering::SeqCst), 1);
        assert_eq!(b.failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_block_others() {
        let set = ListenerSet::new();
        let counting = Counting::new();
        set.add(Arc::new(Exploding)).await;
        set.add(counting.clone()).await;

        set.notify_success(&descriptor()).await;
        assert_eq!(counting.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_by_name() {
        let set = ListenerSet::new();
        set.add(Counting::new()).await;
        assert_eq!(set.len().await, 1);
        assert!(set.remove("counting").await);
        assert!(!set.remove("counting").await);
        assert!(set.is_empty().await);
    }
}
