//! Ownership of live subscriptions.
//!
//! A [`SubscriptionScope`] collects the cancel handles of the subscriptions
//! opened on behalf of one owner (a screen, a session). Closing the scope,
//! or dropping its last clone, cancels everything it tracked. Child scopes
//! are closed with their parent, but the parent does not keep them alive.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use spotter_store::{Subscription, SubscriptionHandle};
use tracing::debug;

#[derive(Default)]
struct ScopeInner {
    handles: Vec<SubscriptionHandle>,
    children: Vec<Weak<Mutex<ScopeInner>>>,
    closed: bool,
}

impl ScopeInner {
    fn close(&mut self) {
        self.closed = true;
        for handle in self.handles.drain(..) {
            handle.cancel();
        }
        for child in self.children.drain(..) {
            if let Some(child) = child.upgrade() {
                lock(&child).close();
            }
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock(inner: &Mutex<ScopeInner>) -> MutexGuard<'_, ScopeInner> {
    // Nothing in the scope can be left half-updated by a panic.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct SubscriptionScope {
    inner: Arc<Mutex<ScopeInner>>,
}

impl SubscriptionScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a subscription. On a closed scope it is cancelled immediately.
    pub fn track<T>(&self, subscription: &Subscription<T>) {
        self.track_handle(subscription.handle());
    }

    pub fn track_handle(&self, handle: SubscriptionHandle) {
        let mut inner = lock(&self.inner);
        if inner.closed {
            drop(inner);
            debug!(query = handle.query(), "scope closed, cancelling new subscription");
            handle.cancel();
            return;
        }
        inner.handles.retain(|h| !h.is_cancelled());
        inner.handles.push(handle);
    }

    /// A scope closed together with this one.
    pub fn child(&self) -> SubscriptionScope {
        let child = SubscriptionScope::new();
        let mut inner = lock(&self.inner);
        if inner.closed {
            lock(&child.inner).closed = true;
        } else {
            inner.children.retain(|c| c.strong_count() > 0);
            inner.children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Cancel every tracked subscription and every child scope. Idempotent.
    pub fn close(&self) {
        lock(&self.inner).close();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// Tracked subscriptions that are still running.
    pub fn active(&self) -> usize {
        lock(&self.inner)
            .handles
            .iter()
            .filter(|h| !h.is_cancelled())
            .count()
    }
}

impl std::fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("active", &self.active())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use spotter_store::{Database, DirectoryStore, LiveQuery};

    use super::*;

    fn query(store: Arc<dyn DirectoryStore>) -> LiveQuery<u32> {
        LiveQuery::new(store, "constant", |_| false, |_| async { Ok(vec![1]) })
    }

    fn store() -> Arc<dyn DirectoryStore> {
        Arc::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_close_cancels_tracked() {
        let scope = SubscriptionScope::new();
        let mut sub = query(store()).subscribe();
        scope.track(&sub);
        assert_eq!(scope.active(), 1);

        scope.close();
        assert!(sub.is_cancelled());
        assert!(sub.next().await.is_none());
        assert_eq!(scope.active(), 0);
    }

    #[tokio::test]
    async fn test_closed_scope_cancels_late_arrivals() {
        let scope = SubscriptionScope::new();
        scope.close();

        let sub = query(store()).subscribe();
        scope.track(&sub);
        assert!(sub.is_cancelled());
        assert!(scope.child().is_closed());
    }

    #[tokio::test]
    async fn test_parent_closes_children_but_child_drop_is_local() {
        let store = store();
        let parent = SubscriptionScope::new();
        let kept = parent.child();
        let dropped = parent.child();

        let in_kept = query(store.clone()).subscribe();
        let in_dropped = query(store.clone()).subscribe();
        kept.track(&in_kept);
        dropped.track(&in_dropped);

        drop(dropped);
        assert!(in_dropped.is_cancelled());
        assert!(!in_kept.is_cancelled());

        parent.close();
        assert!(in_kept.is_cancelled());
        assert!(kept.is_closed());
    }
}
