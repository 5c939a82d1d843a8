//! Test doubles and fixtures shared by the client tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, Barrier, Notify};

use spotter_shared::protocol::{
    ChatChannel, ChatMessage, LikeEdge, MatchRecord, NewMessage, ProfileFields, UserProfile,
};
use spotter_shared::{ChannelKey, MatchKey, UserId, UserPair};
use spotter_store::{
    Change, ChatPatch, CreateOutcome, Database, DirectoryStore, Result, StoreError, WriteMode,
};

use crate::config::ClientConfig;
use crate::profile::ProfileDraft;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    GetUser,
    ListUsers,
    SetUser,
    PutLike,
    GetLike,
    MatchesFor,
    AddMatch,
    CreateMatch,
    GetChat,
    MergeChat,
    ChatsFor,
    AppendMessage,
    Messages,
}

/// Wraps a [`Database`], failing chosen operations on demand and optionally
/// holding every `matches_for` caller at a barrier after its read. The
/// barrier forces two detections to both see "no match" before either
/// creates one.
///
/// A held operation parks before touching the store until [`TestStore::release`].
pub(crate) struct TestStore {
    inner: Arc<Database>,
    failing: Mutex<HashSet<Op>>,
    held: Mutex<HashSet<Op>>,
    parked: Notify,
    released: Notify,
    gate: Option<Barrier>,
    calls: Mutex<Vec<Op>>,
}

impl TestStore {
    pub(crate) fn wrap(inner: &Arc<Database>) -> Arc<Self> {
        Arc::new(Self::new(inner, None))
    }

    pub(crate) fn gated(inner: &Arc<Database>, parties: usize) -> Arc<Self> {
        Arc::new(Self::new(inner, Some(Barrier::new(parties))))
    }

    fn new(inner: &Arc<Database>, gate: Option<Barrier>) -> Self {
        Self {
            inner: inner.clone(),
            failing: Mutex::new(HashSet::new()),
            held: Mutex::new(HashSet::new()),
            parked: Notify::new(),
            released: Notify::new(),
            gate,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn hold(&self, op: Op) {
        self.held.lock().unwrap().insert(op);
    }

    /// Resolves once a held operation is parked.
    pub(crate) async fn wait_held(&self) {
        self.parked.notified().await;
    }

    /// Let parked operations through and stop holding new ones.
    pub(crate) fn release(&self) {
        self.held.lock().unwrap().clear();
        self.released.notify_waiters();
        self.released.notify_one();
    }

    pub(crate) fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub(crate) fn heal(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// Store operations attempted so far, failed ones included.
    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn count(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    async fn park(&self, op: Op) {
        if self.held.lock().unwrap().contains(&op) {
            self.parked.notify_one();
            self.released.notified().await;
        }
    }

    fn enter(&self, op: Op) -> Result<()> {
        self.calls.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(StoreError::Unavailable(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for TestStore {
    async fn get_user(&self, caller: &UserId, id: &UserId) -> Result<Option<UserProfile>> {
        self.park(Op::GetUser).await;
        self.enter(Op::GetUser)?;
        DirectoryStore::get_user(&*self.inner, caller, id).await
    }

    async fn list_users(&self, caller: &UserId) -> Result<Vec<UserProfile>> {
        self.enter(Op::ListUsers)?;
        DirectoryStore::list_users(&*self.inner, caller).await
    }

    async fn set_user(
        &self,
        caller: &UserId,
        id: &UserId,
        fields: &ProfileFields,
        mode: WriteMode,
    ) -> Result<UserProfile> {
        self.enter(Op::SetUser)?;
        self.inner.set_user(caller, id, fields, mode)
    }

    async fn put_like(&self, caller: &UserId, actor: &UserId, target: &UserId) -> Result<LikeEdge> {
        self.enter(Op::PutLike)?;
        self.inner.put_like(caller, actor, target)
    }

    async fn get_like(
        &self,
        caller: &UserId,
        actor: &UserId,
        target: &UserId,
    ) -> Result<Option<LikeEdge>> {
        self.enter(Op::GetLike)?;
        self.inner.get_like(caller, actor, target)
    }

    async fn matches_for(&self, caller: &UserId, user: &UserId) -> Result<Vec<MatchRecord>> {
        self.enter(Op::MatchesFor)?;
        let found = self.inner.matches_for(caller, user);
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        found
    }

    async fn add_match(&self, caller: &UserId, users: &UserPair) -> Result<MatchRecord> {
        self.enter(Op::AddMatch)?;
        self.inner.add_match(caller, users)
    }

    async fn create_match_if_absent(
        &self,
        caller: &UserId,
        key: &MatchKey,
        users: &UserPair,
    ) -> Result<CreateOutcome<MatchRecord>> {
        self.enter(Op::CreateMatch)?;
        self.inner.create_match_if_absent(caller, key, users)
    }

    async fn get_chat(&self, caller: &UserId, key: &ChannelKey) -> Result<Option<ChatChannel>> {
        self.enter(Op::GetChat)?;
        self.inner.get_chat(caller, key)
    }

    async fn merge_chat(
        &self,
        caller: &UserId,
        key: &ChannelKey,
        patch: &ChatPatch,
    ) -> Result<ChatChannel> {
        self.enter(Op::MergeChat)?;
        self.inner.merge_chat(caller, key, patch)
    }

    async fn chats_for(&self, caller: &UserId, user: &UserId) -> Result<Vec<ChatChannel>> {
        self.enter(Op::ChatsFor)?;
        self.inner.chats_for(caller, user)
    }

    async fn append_message(
        &self,
        caller: &UserId,
        key: &ChannelKey,
        message: &NewMessage,
    ) -> Result<ChatMessage> {
        self.enter(Op::AppendMessage)?;
        self.inner.append_message(caller, key, message)
    }

    async fn messages(&self, caller: &UserId, key: &ChannelKey) -> Result<Vec<ChatMessage>> {
        self.enter(Op::Messages)?;
        self.inner.messages(caller, key)
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.inner.subscribe_changes()
    }
}

pub(crate) fn uid(s: &str) -> UserId {
    UserId::parse(s).unwrap()
}

pub(crate) fn shared_db() -> Arc<Database> {
    Arc::new(Database::open_in_memory().unwrap())
}

pub(crate) fn session(db: &Arc<Database>, name: &str) -> Session {
    Session::new(db.clone(), uid(name), ClientConfig::default())
}

pub(crate) fn session_on(store: Arc<dyn DirectoryStore>, name: &str, config: ClientConfig) -> Session {
    Session::new(store, uid(name), config)
}

pub(crate) fn draft(name: &str) -> ProfileDraft {
    ProfileDraft {
        name: name.into(),
        gym_name: "Iron Works".into(),
        workout_type: "Weightlifting".into(),
        timing: "Morning".into(),
        photo_url: None,
    }
}

/// Every match document listing `user`.
pub(crate) fn match_docs(db: &Database, user: &str) -> Vec<MatchRecord> {
    db.matches_for(&uid(user), &uid(user)).unwrap()
}
