//! The async seam between the client and the directory store.
//!
//! Every call names the authenticated `caller` so the store can apply the
//! access policy itself; components never get a way around it.

use async_trait::async_trait;
use tokio::sync::broadcast;

use spotter_shared::protocol::{
    ChatChannel, ChatMessage, LikeEdge, MatchRecord, NewMessage, ProfileFields, UserProfile,
};
use spotter_shared::{ChannelKey, MatchKey, UserId, UserPair};

use crate::database::Database;
use crate::error::Result;

/// Collections that can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Likes,
    Matches,
    Chats,
    Messages,
}

/// A committed write, as announced on the change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: Collection,
    /// Document path, e.g. `chats/zed_amy/messages/3f2a...`.
    pub path: String,
}

impl Change {
    /// Whether the change touched a document at or below `prefix`.
    pub fn is_under(&self, prefix: &str) -> bool {
        self.path == prefix
            || (self.path.starts_with(prefix) && self.path[prefix.len()..].starts_with('/'))
    }
}

/// How a profile write treats an existing document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the document, stamping `createdAt`.
    Overwrite,
    /// Update the given fields, keeping `createdAt` and stamping `updatedAt`.
    Merge,
}

/// Fields merged into a chat document. Participants always come from the
/// channel key; `createdAt` is only set when the document is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPatch {
    pub last_message: Option<String>,
    /// Stamp `lastMessageTimestamp` with the server time.
    pub touch_last_message_at: bool,
}

impl ChatPatch {
    /// Make sure the channel exists; leaves an existing summary untouched.
    pub fn bootstrap() -> Self {
        Self::default()
    }

    /// Summary update for a freshly sent message.
    pub fn last_message(text: impl Into<String>) -> Self {
        Self {
            last_message: Some(text.into()),
            touch_last_message_at: true,
        }
    }
}

/// Result of a conditional create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<T> {
    Created(T),
    Existing(T),
}

impl<T> CreateOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            CreateOutcome::Created(v) | CreateOutcome::Existing(v) => v,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn get_user(&self, caller: &UserId, id: &UserId) -> Result<Option<UserProfile>>;

    /// All profiles, ordered by id.
    async fn list_users(&self, caller: &UserId) -> Result<Vec<UserProfile>>;

    async fn set_user(
        &self,
        caller: &UserId,
        id: &UserId,
        fields: &ProfileFields,
        mode: WriteMode,
    ) -> Result<UserProfile>;

    /// Write (or overwrite) the edge `actor -> target` with a fresh timestamp.
    async fn put_like(&self, caller: &UserId, actor: &UserId, target: &UserId)
        -> Result<LikeEdge>;

    async fn get_like(
        &self,
        caller: &UserId,
        actor: &UserId,
        target: &UserId,
    ) -> Result<Option<LikeEdge>>;

    /// Matches whose participants include `user`, oldest first.
    async fn matches_for(&self, caller: &UserId, user: &UserId) -> Result<Vec<MatchRecord>>;

    /// Create a match under a fresh auto id.
    async fn add_match(&self, caller: &UserId, users: &UserPair) -> Result<MatchRecord>;

    /// Create the match keyed by `key` unless a document with that key exists.
    async fn create_match_if_absent(
        &self,
        caller: &UserId,
        key: &MatchKey,
        users: &UserPair,
    ) -> Result<CreateOutcome<MatchRecord>>;

    async fn get_chat(&self, caller: &UserId, key: &ChannelKey) -> Result<Option<ChatChannel>>;

    /// Upsert the chat document with merge semantics.
    async fn merge_chat(
        &self,
        caller: &UserId,
        key: &ChannelKey,
        patch: &ChatPatch,
    ) -> Result<ChatChannel>;

    /// Chats whose participants include `user`, most recently active first.
    async fn chats_for(&self, caller: &UserId, user: &UserId) -> Result<Vec<ChatChannel>>;

    async fn append_message(
        &self,
        caller: &UserId,
        key: &ChannelKey,
        message: &NewMessage,
    ) -> Result<ChatMessage>;

    /// Messages of a channel ordered by `createdAt`, then id.
    async fn messages(&self, caller: &UserId, key: &ChannelKey) -> Result<Vec<ChatMessage>>;

    fn changes(&self) -> broadcast::Receiver<Change>;
}

#[async_trait]
impl DirectoryStore for Database {
    async fn get_user(&self, _caller: &UserId, id: &UserId) -> Result<Option<UserProfile>> {
        let id = id.clone();
        self.blocking(move |db| Database::get_user(db, &id)).await
    }

    async fn list_users(&self, _caller: &UserId) -> Result<Vec<UserProfile>> {
        self.blocking(Database::list_users).await
    }

    async fn set_user(
        &self,
        caller: &UserId,
        id: &UserId,
        fields: &ProfileFields,
        mode: WriteMode,
    ) -> Result<UserProfile> {
        let (caller, id, fields) = (caller.clone(), id.clone(), fields.clone());
        self.blocking(move |db| Database::set_user(db, &caller, &id, &fields, mode))
            .await
    }

    async fn put_like(
        &self,
        caller: &UserId,
        actor: &UserId,
        target: &UserId,
    ) -> Result<LikeEdge> {
        let (caller, actor, target) = (caller.clone(), actor.clone(), target.clone());
        self.blocking(move |db| Database::put_like(db, &caller, &actor, &target))
            .await
    }

    async fn get_like(
        &self,
        caller: &UserId,
        actor: &UserId,
        target: &UserId,
    ) -> Result<Option<LikeEdge>> {
        let (caller, actor, target) = (caller.clone(), actor.clone(), target.clone());
        self.blocking(move |db| Database::get_like(db, &caller, &actor, &target))
            .await
    }

    async fn matches_for(&self, caller: &UserId, user: &UserId) -> Result<Vec<MatchRecord>> {
        let (caller, user) = (caller.clone(), user.clone());
        self.blocking(move |db| Database::matches_for(db, &caller, &user))
            .await
    }

    async fn add_match(&self, caller: &UserId, users: &UserPair) -> Result<MatchRecord> {
        let (caller, users) = (caller.clone(), users.clone());
        self.blocking(move |db| Database::add_match(db, &caller, &users))
            .await
    }

    async fn create_match_if_absent(
        &self,
        caller: &UserId,
        key: &MatchKey,
        users: &UserPair,
    ) -> Result<CreateOutcome<MatchRecord>> {
        let (caller, key, users) = (caller.clone(), key.clone(), users.clone());
        self.blocking(move |db| Database::create_match_if_absent(db, &caller, &key, &users))
            .await
    }

    async fn get_chat(&self, caller: &UserId, key: &ChannelKey) -> Result<Option<ChatChannel>> {
        let (caller, key) = (caller.clone(), key.clone());
        self.blocking(move |db| Database::get_chat(db, &caller, &key))
            .await
    }

    async fn merge_chat(
        &self,
        caller: &UserId,
        key: &ChannelKey,
        patch: &ChatPatch,
    ) -> Result<ChatChannel> {
        let (caller, key, patch) = (caller.clone(), key.clone(), patch.clone());
        self.blocking(move |db| Database::merge_chat(db, &caller, &key, &patch))
            .await
    }

    async fn chats_for(&self, caller: &UserId, user: &UserId) -> Result<Vec<ChatChannel>> {
        let (caller, user) = (caller.clone(), user.clone());
        self.blocking(move |db| Database::chats_for(db, &caller, &user))
            .await
    }

    async fn append_message(
        &self,
        caller: &UserId,
        key: &ChannelKey,
        message: &NewMessage,
    ) -> Result<ChatMessage> {
        let (caller, key, message) = (caller.clone(), key.clone(), message.clone());
        self.blocking(move |db| Database::append_message(db, &caller, &key, &message))
            .await
    }

    async fn messages(&self, caller: &UserId, key: &ChannelKey) -> Result<Vec<ChatMessage>> {
        let (caller, key) = (caller.clone(), key.clone());
        self.blocking(move |db| Database::messages(db, &caller, &key))
            .await
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.subscribe_changes()
    }
}
