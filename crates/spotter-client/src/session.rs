//! The signed-in session: the context every client operation runs in.

use std::sync::Arc;

use spotter_shared::UserId;
use spotter_store::{DirectoryStore, LiveQuery, Subscription};
use tracing::info;

use crate::config::ClientConfig;
use crate::scope::SubscriptionScope;

/// Store handle plus the authenticated identity.
///
/// Cheap to clone; clones share the store and the root subscription scope.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn DirectoryStore>,
    me: UserId,
    email: Option<String>,
    config: ClientConfig,
    root: SubscriptionScope,
    /// Where new subscriptions are tracked: the root, or a screen scope.
    scope: SubscriptionScope,
}

impl Session {
    pub fn new(store: Arc<dyn DirectoryStore>, me: UserId, config: ClientConfig) -> Self {
        info!(user = %me.short(), "session started");
        let root = SubscriptionScope::new();
        Self {
            store,
            me,
            email: None,
            config,
            scope: root.clone(),
            root,
        }
    }

    /// Contact address from the sign-in provider, copied into the profile.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn me(&self) -> &UserId {
        &self.me
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn store(&self) -> &Arc<dyn DirectoryStore> {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A scope for one screen, closed on sign-out at the latest.
    pub fn scope(&self) -> SubscriptionScope {
        self.scope.child()
    }

    /// The same session, with subscriptions tracked by `scope`.
    ///
    /// Closing or dropping `scope` cancels them; signing out still does.
    pub fn within(&self, scope: &SubscriptionScope) -> Session {
        Session {
            scope: scope.clone(),
            ..self.clone()
        }
    }

    pub fn is_signed_out(&self) -> bool {
        self.root.is_closed()
    }

    /// Cancel every subscription opened through this session.
    pub fn sign_out(&self) {
        self.root.close();
        info!(user = %self.me.short(), "signed out");
    }

    /// Keeps the root scope open for as long as a long-lived handle
    /// (a notifier, a chat room) outlives the `Session` value.
    pub(crate) fn root(&self) -> SubscriptionScope {
        self.root.clone()
    }

    /// Subscribe to `query` with the configured buffering and polling,
    /// tracked by the current scope.
    pub(crate) fn live<T>(&self, query: LiveQuery<T>) -> Subscription<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let subscription = query
            .with_poll_interval(self.config.poll_interval)
            .with_buffer(self.config.subscription_buffer)
            .subscribe();
        self.scope.track(&subscription);
        subscription
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("me", &self.me)
            .field("config", &self.config)
            .field("root", &self.root)
            .field("scope", &self.scope)
            .finish()
    }
}
