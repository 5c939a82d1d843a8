//! Chat Channel Bootstrapper, the chat list and open chat rooms.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use spotter_shared::constants::{CHATS_COLLECTION, EMPTY_CHAT_PREVIEW, MESSAGES_COLLECTION};
use spotter_shared::protocol::{ChatChannel, ChatMessage};
use spotter_shared::{ChannelKey, UserId};
use spotter_store::{
    Change, ChatPatch, Collection, DirectoryStore, LiveQuery, Subscription, SubscriptionHandle,
};

use crate::error::{ClientError, Result};
use crate::messaging;
use crate::scope::SubscriptionScope;
use crate::session::Session;

/// One row of the chat list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub key: ChannelKey,
    pub counterpart: UserId,
    pub preview: String,
    pub last_activity: DateTime<Utc>,
}

impl ChatSummary {
    /// `None` if `me` is not a participant of `channel`.
    pub fn from_channel(channel: &ChatChannel, me: &UserId) -> Option<Self> {
        let counterpart = channel.users.other(me)?.clone();
        Some(Self {
            key: channel.id.clone(),
            counterpart,
            preview: channel
                .last_message
                .clone()
                .unwrap_or_else(|| EMPTY_CHAT_PREVIEW.to_string()),
            last_activity: channel.last_message_timestamp,
        })
    }
}

/// An open conversation: the bootstrapped channel and its live history.
pub struct ChatRoom {
    store: Arc<dyn DirectoryStore>,
    me: UserId,
    counterpart: UserId,
    channel: ChatChannel,
    messages: Subscription<ChatMessage>,
    _session: SubscriptionScope,
}

impl ChatRoom {
    pub fn key(&self) -> &ChannelKey {
        &self.channel.id
    }

    pub fn counterpart(&self) -> &UserId {
        &self.counterpart
    }

    /// The channel document as it was when the room opened.
    pub fn channel(&self) -> &ChatChannel {
        &self.channel
    }

    /// Next full history snapshot, ordered by server timestamp.
    pub async fn next_messages(&mut self) -> Option<Result<Vec<ChatMessage>>> {
        self.messages
            .next()
            .await
            .map(|delivery| delivery.map_err(ClientError::from))
    }

    pub async fn send(&self, text: &str) -> Result<Option<ChatMessage>> {
        messaging::send(self.store.as_ref(), &self.me, &self.counterpart, text).await
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.messages.handle()
    }

    /// Stop listening. No snapshot is delivered afterwards.
    pub fn close(&mut self) {
        self.messages.cancel();
        debug!(chat = %self.channel.id, "chat closed");
    }
}

impl Session {
    pub fn channel_key(&self, counterpart: &UserId) -> Result<ChannelKey> {
        Ok(ChannelKey::derive(self.me(), counterpart)?)
    }

    /// Make sure the channel with `counterpart` exists, creating it if
    /// needed. Both participants may call this at once; they converge on
    /// one document and an existing summary is left alone.
    pub async fn bootstrap_chat(&self, counterpart: &UserId) -> Result<ChatChannel> {
        let key = self.channel_key(counterpart)?;
        match self
            .store()
            .merge_chat(self.me(), &key, &ChatPatch::bootstrap())
            .await
        {
            Ok(channel) => Ok(channel),
            Err(source) => {
                warn!(chat = %key, error = %source, "chat bootstrap failed");
                Err(ClientError::ChannelBootstrapFailed { key, source })
            }
        }
    }

    /// Bootstrap the channel, then start listening to its messages.
    ///
    /// The history subscription is only opened once the channel document
    /// exists, since message reads are authorised against it.
    pub async fn open_chat(&self, counterpart: &UserId) -> Result<ChatRoom> {
        let channel = self.bootstrap_chat(counterpart).await?;
        let messages = self.watch_messages(&channel.id);
        debug!(chat = %channel.id, "chat opened");
        Ok(ChatRoom {
            store: self.store().clone(),
            me: self.me().clone(),
            counterpart: counterpart.clone(),
            channel,
            messages,
            _session: self.root(),
        })
    }

    /// Live history of one channel. Fails if the channel was never
    /// bootstrapped; prefer [`Session::open_chat`].
    pub fn watch_messages(&self, key: &ChannelKey) -> Subscription<ChatMessage> {
        let me = self.me().clone();
        let key = key.clone();
        let prefix = format!("{CHATS_COLLECTION}/{key}/{MESSAGES_COLLECTION}");
        let query = LiveQuery::new(
            self.store().clone(),
            format!("messages of {key}"),
            move |change: &Change| change.is_under(&prefix),
            move |store: Arc<dyn DirectoryStore>| {
                let (me, key) = (me.clone(), key.clone());
                async move { store.messages(&me, &key).await }
            },
        );
        self.live(query)
    }

    /// Live chat list, most recently active first.
    pub fn watch_chats(&self) -> Subscription<ChatChannel> {
        let me = self.me().clone();
        let query = LiveQuery::new(
            self.store().clone(),
            format!("chats of {}", me.short()),
            |change: &Change| change.collection == Collection::Chats,
            move |store: Arc<dyn DirectoryStore>| {
                let me = me.clone();
                async move { store.chats_for(&me, &me).await }
            },
        );
        self.live(query)
    }

    pub async fn chat_summaries(&self) -> Result<Vec<ChatSummary>> {
        let chats = self.store().chats_for(self.me(), self.me()).await?;
        Ok(chats
            .iter()
            .filter_map(|channel| ChatSummary::from_channel(channel, self.me()))
            .collect())
    }
}
