//! Live queries over the directory store.
//!
//! A [`LiveQuery`] describes what to watch and how to fetch it. Nothing runs
//! until [`LiveQuery::subscribe`] is called, and a query can be subscribed
//! again after its stream died. Each [`Subscription`] is backed by a tokio
//! task that re-runs the fetch whenever a relevant change is committed (or
//! a poll tick fires) and delivers the full ordered result set whenever it
//! differs from the last one delivered.
//!
//! Cancellation is synchronous: once [`Subscription::cancel`] or
//! [`SubscriptionHandle::cancel`] returns, no further item is yielded, not
//! even one already sitting in the buffer.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::Stream;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, warn};

use spotter_shared::constants::DEFAULT_SUBSCRIPTION_BUFFER;

use crate::directory::{Change, DirectoryStore};
use crate::error::Result;

/// Terminal failure of a live subscription. The stream ends after it; the
/// subscriber must resubscribe or surface the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Live query {query} failed: {reason}")]
    Fetch { query: String, reason: String },

    #[error("Change feed for {query} closed")]
    FeedClosed { query: String },
}

/// One delivery: a full ordered snapshot, or the terminal error.
pub type Delivery<T> = std::result::Result<Vec<T>, SubscriptionError>;

type FetchFn<T> =
    Arc<dyn Fn(Arc<dyn DirectoryStore>) -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;
type InterestFn = Arc<dyn Fn(&Change) -> bool + Send + Sync>;

/// A lazy, restartable description of a standing query.
pub struct LiveQuery<T> {
    store: Arc<dyn DirectoryStore>,
    label: String,
    interest: InterestFn,
    fetch: FetchFn<T>,
    poll_interval: Option<Duration>,
    buffer: usize,
}

impl<T> Clone for LiveQuery<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            label: self.label.clone(),
            interest: self.interest.clone(),
            fetch: self.fetch.clone(),
            poll_interval: self.poll_interval,
            buffer: self.buffer,
        }
    }
}

impl<T> LiveQuery<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// # Arguments
    ///
    /// * `label` - human-readable query description used in logs and errors
    /// * `interest` - which committed changes can affect the result
    /// * `fetch` - produces the full ordered result set
    pub fn new<I, F, Fut>(
        store: Arc<dyn DirectoryStore>,
        label: impl Into<String>,
        interest: I,
        fetch: F,
    ) -> Self
    where
        I: Fn(&Change) -> bool + Send + Sync + 'static,
        F: Fn(Arc<dyn DirectoryStore>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        Self {
            store,
            label: label.into(),
            interest: Arc::new(interest),
            fetch: Arc::new(move |store: Arc<dyn DirectoryStore>| fetch(store).boxed()),
            poll_interval: None,
            buffer: DEFAULT_SUBSCRIPTION_BUFFER,
        }
    }

    /// Also re-fetch on a fixed interval, to observe writers the change feed
    /// cannot see (other processes sharing the database file).
    pub fn with_poll_interval(mut self, interval: Option<Duration>) -> Self {
        self.poll_interval = interval.filter(|d| !d.is_zero());
        self
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start the query. Must be called from within a tokio runtime.
    pub fn subscribe(&self) -> Subscription<T> {
        // Register on the feed before the first fetch so no change is lost
        // between the two.
        let changes = self.store.changes();
        let (tx, rx) = mpsc::channel(self.buffer);

        let task = tokio::spawn(run(self.clone(), changes, tx));
        debug!(query = %self.label, "subscription opened");

        Subscription {
            rx,
            handle: SubscriptionHandle {
                inner: Arc::new(HandleInner {
                    cancelled: AtomicBool::new(false),
                    task: task.abort_handle(),
                    label: self.label.clone(),
                }),
            },
        }
    }
}

async fn run<T>(
    query: LiveQuery<T>,
    mut changes: broadcast::Receiver<Change>,
    tx: mpsc::Sender<Delivery<T>>,
) where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    let mut ticker = query.poll_interval.map(|period| {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });
    let mut last: Option<Vec<T>> = None;

    loop {
        match (query.fetch)(query.store.clone()).await {
            Ok(snapshot) => {
                if last.as_ref() != Some(&snapshot) {
                    if tx.send(Ok(snapshot.clone())).await.is_err() {
                        return;
                    }
                    last = Some(snapshot);
                }
            }
            Err(e) => {
                warn!(query = %query.label, error = %e, "live query fetch failed");
                let _ = tx
                    .send(Err(SubscriptionError::Fetch {
                        query: query.label.clone(),
                        reason: e.to_string(),
                    }))
                    .await;
                return;
            }
        }

        // Wait until something relevant happens.
        loop {
            let refetch = tokio::select! {
                _ = tx.closed() => return,
                change = changes.recv() => match change {
                    Ok(change) => (query.interest)(&change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(query = %query.label, skipped, "change feed lagged, refetching");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        error!(query = %query.label, "change feed closed");
                        let _ = tx
                            .send(Err(SubscriptionError::FeedClosed {
                                query: query.label.clone(),
                            }))
                            .await;
                        return;
                    }
                },
                _ = next_tick(&mut ticker) => true,
            };
            if refetch {
                break;
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

struct HandleInner {
    cancelled: AtomicBool,
    task: AbortHandle,
    label: String,
}

/// Detached cancel switch for a [`Subscription`], e.g. held by a scope.
#[derive(Clone)]
pub struct SubscriptionHandle {
    inner: Arc<HandleInner>,
}

impl SubscriptionHandle {
    /// Stop the subscription. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.task.abort();
            debug!(query = %self.inner.label, "subscription cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn query(&self) -> &str {
        &self.inner.label
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("query", &self.inner.label)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A running live query. Dropping it cancels it.
pub struct Subscription<T> {
    rx: mpsc::Receiver<Delivery<T>>,
    handle: SubscriptionHandle,
}

impl<T> Subscription<T> {
    /// Next snapshot; `None` once cancelled or after the terminal error.
    pub async fn next(&mut self) -> Option<Delivery<T>> {
        if self.handle.is_cancelled() {
            return None;
        }
        let item = self.rx.recv().await;
        if self.handle.is_cancelled() {
            return None;
        }
        item
    }

    pub fn cancel(&mut self) {
        self.handle.cancel();
        self.rx.close();
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    pub fn query(&self) -> &str {
        self.handle.query()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Delivery<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.handle.is_cancelled() {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(_) if this.handle.is_cancelled() => Poll::Ready(None),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures::StreamExt;
    use spotter_shared::protocol::ProfileFields;
    use spotter_shared::UserId;

    use super::*;
    use crate::database::Database;
    use crate::directory::{Collection, WriteMode};
    use crate::StoreError;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    fn profile(name: &str) -> ProfileFields {
        ProfileFields {
            name: name.into(),
            gym_name: "Gym".into(),
            workout_type: "Cardio".into(),
            timing: "Morning".into(),
            ..Default::default()
        }
    }

    fn users_query(db: Arc<Database>) -> LiveQuery<String> {
        let caller = uid("amy");
        LiveQuery::new(
            db,
            "all users",
            |c: &Change| c.collection == Collection::Users,
            move |store: Arc<dyn DirectoryStore>| {
                let caller = caller.clone();
                async move {
                    let users = store.list_users(&caller).await?;
                    Ok(users.into_iter().map(|u| u.id.to_string()).collect())
                }
            },
        )
    }

    async fn next_snapshot(sub: &mut Subscription<String>) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(5), sub.next())
            .await
            .expect("snapshot in time")
            .expect("stream open")
            .expect("no error")
    }

    #[tokio::test]
    async fn test_initial_and_updated_snapshots() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut sub = users_query(db.clone()).subscribe();

        assert!(next_snapshot(&mut sub).await.is_empty());

        let amy = uid("amy");
        db.set_user(&amy, &amy, &profile("Amy"), WriteMode::Overwrite)
            .unwrap();
        assert_eq!(next_snapshot(&mut sub).await, ["amy"]);
    }

    #[tokio::test]
    async fn test_unrelated_changes_do_not_redeliver() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut sub = users_query(db.clone()).subscribe();
        next_snapshot(&mut sub).await;

        let (amy, zed) = (uid("amy"), uid("zed"));
        db.put_like(&amy, &amy, &zed).unwrap();
        let quiet = tokio::time::timeout(Duration::from_millis(100), sub.next()).await;
        assert!(quiet.is_err(), "like edges must not wake a users query");
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery_including_buffered() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut sub = users_query(db.clone()).subscribe();
        next_snapshot(&mut sub).await;

        let amy = uid("amy");
        db.set_user(&amy, &amy, &profile("Amy"), WriteMode::Overwrite)
            .unwrap();
        // Let the task buffer the new snapshot before cancelling.
        tokio::time::sleep(Duration::from_millis(50)).await;

        sub.cancel();
        assert!(sub.next().await.is_none());
        assert!(sub.is_cancelled());
    }

    #[tokio::test]
    async fn test_detached_handle_cancels_waiting_subscriber() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let mut sub = users_query(db.clone()).subscribe();
        next_snapshot(&mut sub).await;

        let handle = sub.handle();
        let waiter = tokio::spawn(async move { sub.next().await.is_none() });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let ended = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(ended);
    }

    #[tokio::test]
    async fn test_fetch_error_is_terminal_and_query_restartable() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let query: LiveQuery<String> = LiveQuery::new(
            db,
            "flaky",
            |_: &Change| true,
            move |_store: Arc<dyn DirectoryStore>| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(StoreError::Unavailable("offline".into()))
                    } else {
                        Ok(vec!["ok".to_string()])
                    }
                }
            },
        );

        let mut first = query.subscribe();
        assert!(matches!(
            first.next().await,
            Some(Err(SubscriptionError::Fetch { .. }))
        ));
        assert!(first.next().await.is_none());

        let mut second = query.subscribe();
        assert_eq!(next_snapshot(&mut second).await, ["ok"]);
    }

    #[tokio::test]
    async fn test_poll_interval_refetches() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let query: LiveQuery<usize> = LiveQuery::new(
            db,
            "ticking",
            |_: &Change| false,
            move |_store: Arc<dyn DirectoryStore>| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(vec![n]) }
            },
        )
        .with_poll_interval(Some(Duration::from_millis(10)));

        let sub = query.subscribe();
        let snapshots: Vec<_> = sub.take(3).collect().await;
        assert_eq!(snapshots.len(), 3);
        assert!(snapshots.iter().all(|s| s.is_ok()));
    }
}
